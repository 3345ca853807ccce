//! Scalar symbolic engine: expressions, dense matrices and determinants

mod expr;
mod matrix;
mod traversal;

pub use expr::{BinaryOp, Sx, SxKind, UnaryOp};
pub use matrix::{MAX_DET_SIZE, SxMatrix, det};
pub use traversal::topological_order;
