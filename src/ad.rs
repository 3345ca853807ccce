//! Reverse-mode differentiation over expression DAGs
//!
//! Adjoints are themselves symbolic expressions, so the derivative of a
//! function is a new graph that can be interpreted or turned into C code.

use crate::sx::{BinaryOp, Sx, SxKind, UnaryOp, topological_order};
use rustc_hash::FxHashMap;

/// Symbolic adjoints of every node reachable from `outputs`, keyed by node id
///
/// `seeds[k]` is the adjoint assigned to `outputs[k]`. Nodes that receive
/// no contribution are absent from the map.
pub fn reverse(outputs: &[Sx], seeds: &[Sx]) -> FxHashMap<usize, Sx> {
    let mut adjoints: FxHashMap<usize, Sx> = FxHashMap::default();
    for (output, seed) in outputs.iter().zip(seeds) {
        accumulate(&mut adjoints, output, seed.clone());
    }

    let order = topological_order(outputs);
    for node in order.iter().rev() {
        let Some(g) = adjoints.get(&node.id()).cloned() else {
            continue;
        };
        if g.is_zero() {
            continue;
        }
        match node.kind() {
            SxKind::Constant(_) | SxKind::Symbol(_) => {}
            SxKind::Unary(op, a) => {
                let da = match op {
                    UnaryOp::Neg => -&g,
                    UnaryOp::Sq => &g * &(a * 2.0),
                    UnaryOp::Sqrt => &g / &(node * 2.0),
                    UnaryOp::Sin => &g * &a.cos(),
                    UnaryOp::Cos => -(&g * &a.sin()),
                    UnaryOp::Exp => &g * node,
                    UnaryOp::Log => &g / a,
                };
                accumulate(&mut adjoints, a, da);
            }
            SxKind::Binary(op, a, b) => {
                let (da, db) = match op {
                    BinaryOp::Add => (g.clone(), g),
                    BinaryOp::Sub => (g.clone(), -&g),
                    BinaryOp::Mul => (&g * b, &g * a),
                    // d(a/b)/db = -(a/b)/b
                    BinaryOp::Div => (&g / b, -(&(&g * node) / b)),
                };
                accumulate(&mut adjoints, a, da);
                accumulate(&mut adjoints, b, db);
            }
        }
    }
    adjoints
}

fn accumulate(adjoints: &mut FxHashMap<usize, Sx>, node: &Sx, contribution: Sx) {
    if contribution.is_zero() {
        return;
    }
    let updated = match adjoints.remove(&node.id()) {
        Some(existing) => existing + contribution,
        None => contribution,
    };
    adjoints.insert(node.id(), updated);
}

/// Gradient of the scalar `f` with respect to each of `wrt`
pub fn gradient(f: &Sx, wrt: &[Sx]) -> Vec<Sx> {
    let adjoints = reverse(std::slice::from_ref(f), &[Sx::one()]);
    wrt.iter()
        .map(|x| adjoints.get(&x.id()).cloned().unwrap_or_else(Sx::zero))
        .collect()
}
