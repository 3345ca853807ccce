//! Callable numeric functions
//!
//! A [`Function`] owns its input and output buffers. Callers fill the
//! inputs, call [`Function::evaluate`] and read the outputs. Every
//! implementation has to be initialized once before use; the transition is
//! one-way.

mod algorithm;
mod sx_function;

pub use algorithm::{Algorithm, Instruction};
pub use sx_function::SxFunction;

use crate::error::{Result, SymError};

/// Common interface of interpreted and native functions
pub trait Function {
    /// Display name used in logs and reports
    fn name(&self) -> &str;

    /// Prepare the function for evaluation; calling it again is a no-op
    fn init(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn n_in(&self) -> Result<usize>;

    fn n_out(&self) -> Result<usize>;

    /// Copy `values` into input `index`; the length must match exactly
    fn set_input(&mut self, index: usize, values: &[f64]) -> Result<()>;

    /// Evaluate using the current inputs
    fn evaluate(&mut self) -> Result<()>;

    /// Result of the last evaluation
    fn output(&self, index: usize) -> Result<&[f64]>;

    /// Number of elementary operations of one evaluation
    fn n_elementary_ops(&self) -> Result<usize>;

    /// Evaluate a single-input function and return a copy of output 0
    fn call(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        self.set_input(0, input)?;
        self.evaluate()?;
        Ok(self.output(0)?.to_vec())
    }
}

/// Dense input and output buffers shared by the implementations
#[derive(Debug, Clone)]
pub(crate) struct FunctionIo {
    pub(crate) inputs: Vec<Vec<f64>>,
    pub(crate) outputs: Vec<Vec<f64>>,
}

impl FunctionIo {
    pub(crate) fn new(input_sizes: &[usize], output_sizes: &[usize]) -> Self {
        Self {
            inputs: input_sizes.iter().map(|&n| vec![0.0; n]).collect(),
            outputs: output_sizes.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    pub(crate) fn set_input(&mut self, index: usize, values: &[f64]) -> Result<()> {
        let count = self.inputs.len();
        let input = self
            .inputs
            .get_mut(index)
            .ok_or(SymError::IndexOutOfRange {
                kind: "input",
                index,
                count,
            })?;
        if input.len() != values.len() {
            return Err(SymError::dimension("set_input", input.len(), values.len()));
        }
        input.copy_from_slice(values);
        Ok(())
    }

    pub(crate) fn output(&self, index: usize) -> Result<&[f64]> {
        self.outputs
            .get(index)
            .map(Vec::as_slice)
            .ok_or(SymError::IndexOutOfRange {
                kind: "output",
                index,
                count: self.outputs.len(),
            })
    }
}
