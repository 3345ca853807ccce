//! Interpreted functions over scalar expression graphs

use super::{Algorithm, Function, FunctionIo};
use crate::ad;
use crate::error::{Result, SymError};
use crate::sx::{Sx, SxMatrix};
use log::debug;
use rustc_hash::FxHashSet;

#[derive(Debug)]
struct Initialized {
    algorithm: Algorithm,
    work: Vec<f64>,
    io: FunctionIo,
}

/// Function from symbolic input matrices to expression matrices
///
/// Evaluation interprets the [`Algorithm`] built by [`Function::init`].
#[derive(Debug)]
pub struct SxFunction {
    name: String,
    inputs: Vec<SxMatrix>,
    outputs: Vec<SxMatrix>,
    state: Option<Initialized>,
}

impl SxFunction {
    /// Create an uninitialized function
    ///
    /// Every input element must be a symbol and appear only once.
    pub fn new(inputs: Vec<SxMatrix>, outputs: Vec<SxMatrix>) -> Result<Self> {
        let mut seen = FxHashSet::default();
        for (i, input) in inputs.iter().enumerate() {
            for x in input.data() {
                if !x.is_symbolic() {
                    return Err(SymError::InvalidInput(format!(
                        "input {i} contains the non-symbolic element {x}"
                    )));
                }
                if !seen.insert(x.id()) {
                    return Err(SymError::InvalidInput(format!(
                        "symbol {x} appears more than once among the inputs"
                    )));
                }
            }
        }
        Ok(Self {
            name: "sx_function".to_string(),
            inputs,
            outputs,
            state: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn inputs(&self) -> &[SxMatrix] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SxMatrix] {
        &self.outputs
    }

    /// Instruction list of an initialized function
    pub fn algorithm(&self) -> Result<&Algorithm> {
        Ok(&self.initialized()?.algorithm)
    }

    /// Gradient of scalar output `oind` with respect to input `iind`
    ///
    /// The result has the shape of the input.
    pub fn grad(&self, iind: usize, oind: usize) -> Result<SxMatrix> {
        self.initialized()?;
        let input = self.input_at(iind)?;
        let output = self.output_at(oind)?;
        if !output.is_scalar() {
            return Err(SymError::NotScalar {
                index: oind,
                rows: output.rows(),
                cols: output.cols(),
            });
        }
        let g = ad::gradient(&output.data()[0], input.data());
        SxMatrix::from_elements(input.rows(), input.cols(), g)
    }

    /// Jacobian of output `oind` with respect to input `iind`
    ///
    /// Row `r` holds the derivatives of output element `r`, column `c`
    /// those with respect to input element `c`. One reverse sweep is made
    /// per output element.
    pub fn jacobian(&self, iind: usize, oind: usize) -> Result<SxMatrix> {
        self.initialized()?;
        let input = self.input_at(iind)?;
        let output = self.output_at(oind)?;
        let (rows, cols) = (output.numel(), input.numel());
        let mut data = vec![Sx::zero(); rows * cols];
        for (r, f) in output.data().iter().enumerate() {
            let row = ad::gradient(f, input.data());
            for (c, d) in row.into_iter().enumerate() {
                data[c * rows + r] = d;
            }
        }
        SxMatrix::from_elements(rows, cols, data)
    }

    fn initialized(&self) -> Result<&Initialized> {
        self.state
            .as_ref()
            .ok_or_else(|| SymError::NotInitialized(self.name.clone()))
    }

    fn initialized_mut(&mut self) -> Result<&mut Initialized> {
        match self.state.as_mut() {
            Some(state) => Ok(state),
            None => Err(SymError::NotInitialized(self.name.clone())),
        }
    }

    fn input_at(&self, index: usize) -> Result<&SxMatrix> {
        self.inputs.get(index).ok_or(SymError::IndexOutOfRange {
            kind: "input",
            index,
            count: self.inputs.len(),
        })
    }

    fn output_at(&self, index: usize) -> Result<&SxMatrix> {
        self.outputs.get(index).ok_or(SymError::IndexOutOfRange {
            kind: "output",
            index,
            count: self.outputs.len(),
        })
    }
}

impl Function for SxFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        let algorithm = Algorithm::lower(&self.inputs, &self.outputs)?;
        let input_sizes: Vec<usize> = self.inputs.iter().map(SxMatrix::numel).collect();
        let output_sizes: Vec<usize> = self.outputs.iter().map(SxMatrix::numel).collect();
        debug!(
            "Initialized '{}': {} elementary operations",
            self.name,
            algorithm.len()
        );
        self.state = Some(Initialized {
            work: vec![0.0; algorithm.work_size()],
            io: FunctionIo::new(&input_sizes, &output_sizes),
            algorithm,
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn n_in(&self) -> Result<usize> {
        Ok(self.inputs.len())
    }

    fn n_out(&self) -> Result<usize> {
        Ok(self.outputs.len())
    }

    fn set_input(&mut self, index: usize, values: &[f64]) -> Result<()> {
        self.initialized_mut()?.io.set_input(index, values)
    }

    fn evaluate(&mut self) -> Result<()> {
        let state = self.initialized_mut()?;
        state
            .algorithm
            .execute(&mut state.work, &state.io.inputs, &mut state.io.outputs);
        Ok(())
    }

    fn output(&self, index: usize) -> Result<&[f64]> {
        self.initialized()?.io.output(index)
    }

    fn n_elementary_ops(&self) -> Result<usize> {
        Ok(self.algorithm()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sx::det;

    fn quadratic() -> SxFunction {
        // f(x) = x0^2 + 3 x0 x1
        let x = SxMatrix::symbolic("x", 2, 1);
        let (a, b) = (&x.data()[0], &x.data()[1]);
        let f = &(a * a) + &(&(a * b) * 3.0);
        SxFunction::new(vec![x], vec![SxMatrix::scalar(f)]).unwrap()
    }

    #[test]
    fn test_uninitialized_rejects_use() {
        let mut f = quadratic().with_name("q");
        assert!(!f.is_initialized());
        assert!(matches!(f.evaluate(), Err(SymError::NotInitialized(name)) if name == "q"));
        assert!(f.set_input(0, &[1.0, 2.0]).is_err());
        assert!(f.output(0).is_err());
        assert!(f.algorithm().is_err());
        assert!(f.grad(0, 0).is_err());
        assert!(f.n_elementary_ops().is_err());
    }

    #[test]
    fn test_evaluate() {
        let mut f = quadratic();
        f.init().unwrap();
        assert_eq!(f.call(&[2.0, 5.0]).unwrap(), vec![34.0]);
        assert!(f.n_elementary_ops().unwrap() > 0);
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut f = quadratic();
        f.init().unwrap();
        let n = f.n_elementary_ops().unwrap();
        f.init().unwrap();
        assert_eq!(f.n_elementary_ops().unwrap(), n);
    }

    #[test]
    fn test_grad() {
        let mut f = quadratic();
        f.init().unwrap();
        let g = f.grad(0, 0).unwrap();
        assert_eq!(g.shape(), (2, 1));

        let mut gf = SxFunction::new(f.inputs().to_vec(), vec![g]).unwrap();
        gf.init().unwrap();
        // df/dx0 = 2 x0 + 3 x1, df/dx1 = 3 x0
        assert_eq!(gf.call(&[2.0, 5.0]).unwrap(), vec![19.0, 6.0]);
    }

    #[test]
    fn test_grad_requires_scalar_output() {
        let x = SxMatrix::symbolic("x", 2, 1);
        let mut f = SxFunction::new(vec![x.clone()], vec![x]).unwrap();
        f.init().unwrap();
        assert!(matches!(
            f.grad(0, 0),
            Err(SymError::NotScalar { rows: 2, cols: 1, .. })
        ));
        assert!(matches!(
            f.grad(1, 0),
            Err(SymError::IndexOutOfRange { kind: "input", .. })
        ));
    }

    #[test]
    fn test_jacobian() {
        // f(x) = [x0 * x1, sin(x0)]
        let x = SxMatrix::symbolic("x", 2, 1);
        let (a, b) = (x.data()[0].clone(), x.data()[1].clone());
        let out = SxMatrix::column(vec![&a * &b, a.sin()]);
        let mut f = SxFunction::new(vec![x.clone()], vec![out]).unwrap();
        f.init().unwrap();
        let jac = f.jacobian(0, 0).unwrap();
        assert_eq!(jac.shape(), (2, 2));
        assert!(jac.get(0, 0).unwrap().is_same(&b));
        assert!(jac.get(0, 1).unwrap().is_same(&a));
        assert!(jac.get(1, 1).unwrap().is_zero());
    }

    #[test]
    fn test_invalid_inputs() {
        let x = Sx::symbol("x");
        let dup = SxMatrix::column(vec![x.clone(), x.clone()]);
        assert!(matches!(
            SxFunction::new(vec![dup], vec![]),
            Err(SymError::InvalidInput(_))
        ));
        let expr = SxMatrix::scalar(&x * 2.0);
        assert!(SxFunction::new(vec![expr], vec![]).is_err());
    }

    #[test]
    fn test_set_input_length_mismatch() {
        let mut f = quadratic();
        f.init().unwrap();
        assert!(matches!(
            f.set_input(0, &[1.0]),
            Err(SymError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_det_function() {
        let x = SxMatrix::symbolic("x", 3, 3);
        let d = det(&x).unwrap();
        let mut f = SxFunction::new(vec![x.vec()], vec![SxMatrix::scalar(d)]).unwrap();
        f.init().unwrap();
        // rows [2 0 1], [1 3 2], [1 1 1]; column-major input
        let input = [2.0, 1.0, 1.0, 0.0, 3.0, 1.0, 1.0, 2.0, 1.0];
        assert_eq!(f.call(&input).unwrap(), vec![0.0]);
    }
}
