//! Scalar symbolic expressions
//!
//! An [`Sx`] is a cheap handle to an immutable node of an expression DAG.
//! Cloning shares the node, so common subexpressions built by the caller stay
//! common in the graph, in interpreted evaluation and in generated code.

use super::traversal::topological_order;
use crate::error::{Result, SymError};
use rustc_hash::FxHashMap;
use std::fmt;
use std::ops;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Unary elementary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Sq,
    Sqrt,
    Sin,
    Cos,
    Exp,
    Log,
}

impl UnaryOp {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Sq => x * x,
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
        }
    }

    /// Name of the matching C math function, `None` for operators
    pub fn c_function(self) -> Option<&'static str> {
        match self {
            UnaryOp::Neg | UnaryOp::Sq => None,
            UnaryOp::Sqrt => Some("sqrt"),
            UnaryOp::Sin => Some("sin"),
            UnaryOp::Cos => Some("cos"),
            UnaryOp::Exp => Some("exp"),
            UnaryOp::Log => Some("log"),
        }
    }
}

/// Binary elementary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Node payload
#[derive(Debug)]
pub enum SxKind {
    Constant(f64),
    Symbol(String),
    Unary(UnaryOp, Sx),
    Binary(BinaryOp, Sx, Sx),
}

struct SxNode {
    id: usize,
    kind: SxKind,
}

impl Drop for SxNode {
    // Uniquely owned operands are taken apart on an explicit stack, so
    // dropping a deep chain does not recurse once per level.
    fn drop(&mut self) {
        let mut stack = Vec::new();
        take_operands(&mut self.kind, &mut stack);
        while let Some(Sx(node)) = stack.pop() {
            if let Some(mut node) = Arc::into_inner(node) {
                take_operands(&mut node.kind, &mut stack);
            }
        }
    }
}

fn take_operands(kind: &mut SxKind, stack: &mut Vec<Sx>) {
    match std::mem::replace(kind, SxKind::Constant(0.0)) {
        SxKind::Unary(_, a) => stack.push(a),
        SxKind::Binary(_, a, b) => {
            stack.push(a);
            stack.push(b);
        }
        SxKind::Constant(_) | SxKind::Symbol(_) => {}
    }
}

/// Handle to a scalar expression node
#[derive(Clone)]
pub struct Sx(Arc<SxNode>);

impl Sx {
    fn from_kind(kind: SxKind) -> Self {
        Sx(Arc::new(SxNode {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
        }))
    }

    pub fn constant(value: f64) -> Self {
        Self::from_kind(SxKind::Constant(value))
    }

    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    pub fn one() -> Self {
        Self::constant(1.0)
    }

    /// Create a free symbol
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::from_kind(SxKind::Symbol(name.into()))
    }

    /// Apply a unary operation, folding constants and double negation
    pub fn unary(op: UnaryOp, x: &Sx) -> Sx {
        if let Some(v) = x.value() {
            return Sx::constant(op.apply(v));
        }
        if op == UnaryOp::Neg {
            if let SxKind::Unary(UnaryOp::Neg, inner) = x.kind() {
                return inner.clone();
            }
        }
        Self::from_kind(SxKind::Unary(op, x.clone()))
    }

    /// Apply a binary operation with the identity simplifications
    pub fn binary(op: BinaryOp, a: &Sx, b: &Sx) -> Sx {
        if let (Some(x), Some(y)) = (a.value(), b.value()) {
            return Sx::constant(op.apply(x, y));
        }
        match op {
            BinaryOp::Add if a.is_zero() => return b.clone(),
            BinaryOp::Add | BinaryOp::Sub if b.is_zero() => return a.clone(),
            BinaryOp::Sub if a.is_zero() => return Sx::unary(UnaryOp::Neg, b),
            BinaryOp::Mul if a.is_zero() || b.is_zero() => return Sx::zero(),
            BinaryOp::Mul if a.is_one() => return b.clone(),
            BinaryOp::Mul | BinaryOp::Div if b.is_one() => return a.clone(),
            BinaryOp::Div if a.is_zero() => return Sx::zero(),
            _ => {}
        }
        Self::from_kind(SxKind::Binary(op, a.clone(), b.clone()))
    }

    /// Process-unique node id
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn kind(&self) -> &SxKind {
        &self.0.kind
    }

    /// True when both handles point at the same node
    pub fn is_same(&self, other: &Sx) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), SxKind::Constant(_))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.kind(), SxKind::Symbol(_))
    }

    pub fn is_zero(&self) -> bool {
        self.value() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.value() == Some(1.0)
    }

    /// Value of a constant node
    pub fn value(&self) -> Option<f64> {
        match self.kind() {
            SxKind::Constant(v) => Some(*v),
            _ => None,
        }
    }

    /// Name of a symbol node
    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            SxKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Operands of this node in order
    pub fn args(&self) -> impl Iterator<Item = &Sx> {
        let (a, b) = match self.kind() {
            SxKind::Unary(_, a) => (Some(a), None),
            SxKind::Binary(_, a, b) => (Some(a), Some(b)),
            _ => (None, None),
        };
        a.into_iter().chain(b)
    }

    pub fn sq(&self) -> Sx {
        Sx::unary(UnaryOp::Sq, self)
    }

    pub fn sqrt(&self) -> Sx {
        Sx::unary(UnaryOp::Sqrt, self)
    }

    pub fn sin(&self) -> Sx {
        Sx::unary(UnaryOp::Sin, self)
    }

    pub fn cos(&self) -> Sx {
        Sx::unary(UnaryOp::Cos, self)
    }

    pub fn exp(&self) -> Sx {
        Sx::unary(UnaryOp::Exp, self)
    }

    pub fn ln(&self) -> Sx {
        Sx::unary(UnaryOp::Log, self)
    }

    /// Evaluate numerically, with symbol values keyed by node id
    pub fn eval_with(&self, values: &FxHashMap<usize, f64>) -> Result<f64> {
        let mut memo: FxHashMap<usize, f64> = FxHashMap::default();
        for node in topological_order([self]) {
            let v = match node.kind() {
                SxKind::Constant(v) => *v,
                SxKind::Symbol(name) => *values
                    .get(&node.id())
                    .ok_or_else(|| SymError::FreeVariable(name.clone()))?,
                SxKind::Unary(op, a) => op.apply(memo[&a.id()]),
                SxKind::Binary(op, a, b) => op.apply(memo[&a.id()], memo[&b.id()]),
            };
            memo.insert(node.id(), v);
        }
        Ok(memo[&self.id()])
    }
}

impl From<f64> for Sx {
    fn from(value: f64) -> Self {
        Sx::constant(value)
    }
}

enum Piece<'a> {
    Node(&'a Sx),
    Text(&'static str),
}

impl fmt::Display for Sx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Piece::Node(self)];
        while let Some(piece) = stack.pop() {
            let node = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Node(node) => node,
            };
            match node.kind() {
                SxKind::Constant(v) => write!(f, "{v}")?,
                SxKind::Symbol(name) => f.write_str(name)?,
                SxKind::Unary(op, a) => {
                    let open = match op {
                        UnaryOp::Neg => "(-",
                        UnaryOp::Sq => "sq(",
                        // every remaining unary op has a C name
                        _ => {
                            f.write_str(op.c_function().unwrap_or("?"))?;
                            "("
                        }
                    };
                    f.write_str(open)?;
                    stack.push(Piece::Text(")"));
                    stack.push(Piece::Node(a));
                }
                SxKind::Binary(op, a, b) => {
                    f.write_str("(")?;
                    stack.push(Piece::Text(")"));
                    stack.push(Piece::Node(b));
                    stack.push(Piece::Text(op.symbol()));
                    stack.push(Piece::Node(a));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Sx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sx#{}({self})", self.id())
    }
}

// ============================================================================
// Operators
// ============================================================================

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait<&Sx> for &Sx {
            type Output = Sx;
            fn $method(self, rhs: &Sx) -> Sx {
                Sx::binary($op, self, rhs)
            }
        }

        impl ops::$trait<Sx> for Sx {
            type Output = Sx;
            fn $method(self, rhs: Sx) -> Sx {
                Sx::binary($op, &self, &rhs)
            }
        }

        impl ops::$trait<&Sx> for Sx {
            type Output = Sx;
            fn $method(self, rhs: &Sx) -> Sx {
                Sx::binary($op, &self, rhs)
            }
        }

        impl ops::$trait<Sx> for &Sx {
            type Output = Sx;
            fn $method(self, rhs: Sx) -> Sx {
                Sx::binary($op, self, &rhs)
            }
        }

        impl ops::$trait<f64> for &Sx {
            type Output = Sx;
            fn $method(self, rhs: f64) -> Sx {
                Sx::binary($op, self, &Sx::constant(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl ops::Neg for &Sx {
    type Output = Sx;
    fn neg(self) -> Sx {
        Sx::unary(UnaryOp::Neg, self)
    }
}

impl ops::Neg for Sx {
    type Output = Sx;
    fn neg(self) -> Sx {
        Sx::unary(UnaryOp::Neg, &self)
    }
}
