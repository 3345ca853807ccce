//! Linearised instruction lists over a work vector

use crate::error::{Result, SymError};
use crate::sx::{BinaryOp, Sx, SxKind, SxMatrix, UnaryOp, topological_order};
use log::debug;
use rustc_hash::FxHashMap;

/// One elementary operation of an [`Algorithm`]
///
/// `res`, `arg`, `lhs` and `rhs` are work vector slots.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Copy element `element` of input `input` into `res`
    Input {
        res: usize,
        input: usize,
        element: usize,
    },
    Const {
        res: usize,
        value: f64,
    },
    Unary {
        op: UnaryOp,
        res: usize,
        arg: usize,
    },
    Binary {
        op: BinaryOp,
        res: usize,
        lhs: usize,
        rhs: usize,
    },
    /// Copy slot `arg` into element `element` of output `output`
    Output {
        output: usize,
        element: usize,
        arg: usize,
    },
}

/// Straight-line program evaluating a set of expression matrices
#[derive(Debug, Clone)]
pub struct Algorithm {
    instructions: Vec<Instruction>,
    work_size: usize,
    input_shapes: Vec<(usize, usize)>,
    output_shapes: Vec<(usize, usize)>,
}

impl Algorithm {
    /// Lower the graphs of `outputs` into instructions
    ///
    /// Every element of `inputs` must be a distinct symbol. A slot is
    /// returned to the free list once its last consumer has been emitted,
    /// so an instruction may write the slot it reads.
    pub fn lower(inputs: &[SxMatrix], outputs: &[SxMatrix]) -> Result<Self> {
        let mut input_of: FxHashMap<usize, (usize, usize)> = FxHashMap::default();
        for (i, input) in inputs.iter().enumerate() {
            for (k, x) in input.data().iter().enumerate() {
                input_of.insert(x.id(), (i, k));
            }
        }

        let roots: Vec<&Sx> = outputs.iter().flat_map(|m| m.data()).collect();
        let order = topological_order(roots.iter().copied());

        let mut uses: FxHashMap<usize, usize> = FxHashMap::default();
        for node in &order {
            for arg in node.args() {
                *uses.entry(arg.id()).or_default() += 1;
            }
        }
        for root in &roots {
            *uses.entry(root.id()).or_default() += 1;
        }

        let mut slots = SlotAllocator::default();
        let mut slot_of: FxHashMap<usize, usize> = FxHashMap::default();
        let mut instructions = Vec::with_capacity(order.len() + roots.len());

        for node in &order {
            let (res, instruction) = match node.kind() {
                SxKind::Symbol(name) => {
                    let (input, element) = *input_of
                        .get(&node.id())
                        .ok_or_else(|| SymError::FreeVariable(name.clone()))?;
                    let res = slots.acquire();
                    (
                        res,
                        Instruction::Input {
                            res,
                            input,
                            element,
                        },
                    )
                }
                SxKind::Constant(value) => {
                    let res = slots.acquire();
                    (
                        res,
                        Instruction::Const {
                            res,
                            value: *value,
                        },
                    )
                }
                SxKind::Unary(op, a) => {
                    let arg = slot_of[&a.id()];
                    release_use(&mut uses, &mut slots, a, arg);
                    let res = slots.acquire();
                    (res, Instruction::Unary { op: *op, res, arg })
                }
                SxKind::Binary(op, a, b) => {
                    let lhs = slot_of[&a.id()];
                    let rhs = slot_of[&b.id()];
                    release_use(&mut uses, &mut slots, a, lhs);
                    release_use(&mut uses, &mut slots, b, rhs);
                    let res = slots.acquire();
                    (
                        res,
                        Instruction::Binary {
                            op: *op,
                            res,
                            lhs,
                            rhs,
                        },
                    )
                }
            };
            slot_of.insert(node.id(), res);
            instructions.push(instruction);
        }

        for (output, matrix) in outputs.iter().enumerate() {
            for (element, x) in matrix.data().iter().enumerate() {
                instructions.push(Instruction::Output {
                    output,
                    element,
                    arg: slot_of[&x.id()],
                });
            }
        }

        debug!(
            "Lowered {} nodes into {} instructions over {} work slots",
            order.len(),
            instructions.len(),
            slots.size
        );

        Ok(Self {
            instructions,
            work_size: slots.size,
            input_shapes: inputs.iter().map(SxMatrix::shape).collect(),
            output_shapes: outputs.iter().map(SxMatrix::shape).collect(),
        })
    }

    /// Number of elementary operations, inputs, constants and outputs included
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Number of work vector slots
    pub fn work_size(&self) -> usize {
        self.work_size
    }

    pub fn input_shapes(&self) -> &[(usize, usize)] {
        &self.input_shapes
    }

    pub fn output_shapes(&self) -> &[(usize, usize)] {
        &self.output_shapes
    }

    /// Run the instructions; buffer sizes are checked by the caller
    pub(crate) fn execute(&self, work: &mut [f64], inputs: &[Vec<f64>], outputs: &mut [Vec<f64>]) {
        for instruction in &self.instructions {
            match *instruction {
                Instruction::Input {
                    res,
                    input,
                    element,
                } => work[res] = inputs[input][element],
                Instruction::Const { res, value } => work[res] = value,
                Instruction::Unary { op, res, arg } => work[res] = op.apply(work[arg]),
                Instruction::Binary { op, res, lhs, rhs } => {
                    work[res] = op.apply(work[lhs], work[rhs])
                }
                Instruction::Output {
                    output,
                    element,
                    arg,
                } => outputs[output][element] = work[arg],
            }
        }
    }
}

impl<'a> IntoIterator for &'a Algorithm {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

fn release_use(uses: &mut FxHashMap<usize, usize>, slots: &mut SlotAllocator, node: &Sx, slot: usize) {
    if let Some(count) = uses.get_mut(&node.id()) {
        *count -= 1;
        if *count == 0 {
            slots.release(slot);
        }
    }
}

#[derive(Debug, Default)]
struct SlotAllocator {
    free: Vec<usize>,
    size: usize,
}

impl SlotAllocator {
    fn acquire(&mut self) -> usize {
        self.free.pop().unwrap_or_else(|| {
            self.size += 1;
            self.size - 1
        })
    }

    fn release(&mut self, slot: usize) {
        self.free.push(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(alg: &Algorithm, input: &[f64], n_out: usize) -> Vec<f64> {
        let mut work = vec![0.0; alg.work_size()];
        let mut outputs = vec![vec![0.0; n_out]];
        alg.execute(&mut work, &[input.to_vec()], &mut outputs);
        outputs.remove(0)
    }

    #[test]
    fn test_lower_simple_expression() {
        let x = SxMatrix::symbolic("x", 2, 1);
        let (a, b) = (&x.data()[0], &x.data()[1]);
        let f = SxMatrix::scalar(&(a * b) + &Sx::constant(2.0));
        let alg = Algorithm::lower(std::slice::from_ref(&x), std::slice::from_ref(&f)).unwrap();

        // 2 inputs, 1 mul, 1 const, 1 add, 1 output
        assert_eq!(alg.len(), 6);
        assert!(matches!(alg.instructions()[0], Instruction::Input { input: 0, element: 0, .. }));
        assert!(matches!(alg.instructions()[5], Instruction::Output { output: 0, element: 0, .. }));
        assert_eq!(run(&alg, &[3.0, 4.0], 1), vec![14.0]);
    }

    #[test]
    fn test_slots_are_reused() {
        // A chain of unary ops needs a single slot
        let x = SxMatrix::symbolic("x", 1, 1);
        let mut e = x.data()[0].clone();
        for _ in 0..10 {
            e = e.sin();
        }
        let f = SxMatrix::scalar(e);
        let alg = Algorithm::lower(std::slice::from_ref(&x), std::slice::from_ref(&f)).unwrap();
        assert_eq!(alg.work_size(), 1);
        let expected = (0..10).fold(0.5_f64, |v, _| v.sin());
        assert_eq!(run(&alg, &[0.5], 1), vec![expected]);
    }

    #[test]
    fn test_output_values_stay_alive() {
        let x = SxMatrix::symbolic("x", 1, 1);
        let a = &x.data()[0];
        let s = a.sin();
        let f = SxMatrix::column(vec![s.clone(), &s * &s, a.clone()]);
        let alg = Algorithm::lower(std::slice::from_ref(&x), std::slice::from_ref(&f)).unwrap();
        let out = run(&alg, &[0.3], 3);
        assert_eq!(out, vec![0.3_f64.sin(), 0.3_f64.sin() * 0.3_f64.sin(), 0.3]);
    }

    #[test]
    fn test_free_variable() {
        let x = SxMatrix::symbolic("x", 1, 1);
        let f = SxMatrix::scalar(&x.data()[0] + &Sx::symbol("y"));
        let err = Algorithm::lower(std::slice::from_ref(&x), std::slice::from_ref(&f)).unwrap_err();
        assert!(matches!(err, SymError::FreeVariable(name) if name == "y"));
    }

    #[test]
    fn test_shapes_recorded() {
        let x = SxMatrix::symbolic("x", 2, 2);
        let f = SxMatrix::scalar(x.data()[3].clone());
        let alg = Algorithm::lower(std::slice::from_ref(&x), std::slice::from_ref(&f)).unwrap();
        assert_eq!(alg.input_shapes(), &[(2, 2)]);
        assert_eq!(alg.output_shapes(), &[(1, 1)]);
        // unused inputs are not loaded
        assert_eq!(alg.len(), 2);
    }
}
