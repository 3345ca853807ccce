//! Dense column-major matrices of scalar expressions

use super::expr::Sx;
use crate::error::{Result, SymError};
use rustc_hash::FxHashMap;
use std::fmt;

/// Dense matrix of [`Sx`] stored column by column
#[derive(Debug, Clone)]
pub struct SxMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Sx>,
}

impl SxMatrix {
    /// Matrix of fresh symbols `name_k`, `k` being the column-major index
    pub fn symbolic(name: &str, rows: usize, cols: usize) -> Self {
        let data = (0..rows * cols)
            .map(|k| Sx::symbol(format!("{name}_{k}")))
            .collect();
        Self { rows, cols, data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: (0..rows * cols).map(|_| Sx::zero()).collect(),
        }
    }

    /// Build from column-major elements
    pub fn from_elements(rows: usize, cols: usize, data: Vec<Sx>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(SymError::dimension(
                "SxMatrix::from_elements",
                rows * cols,
                data.len(),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    /// Constant matrix from column-major values
    pub fn from_f64(rows: usize, cols: usize, values: &[f64]) -> Result<Self> {
        Self::from_elements(rows, cols, values.iter().map(|&v| Sx::constant(v)).collect())
    }

    /// 1x1 matrix
    pub fn scalar(x: Sx) -> Self {
        Self {
            rows: 1,
            cols: 1,
            data: vec![x],
        }
    }

    /// Column vector
    pub fn column(data: Vec<Sx>) -> Self {
        Self {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Sx> {
        if row < self.rows && col < self.cols {
            self.data.get(col * self.rows + row)
        } else {
            None
        }
    }

    /// Elements in column-major order
    pub fn data(&self) -> &[Sx] {
        &self.data
    }

    /// Stack the columns into one column vector, sharing the elements
    pub fn vec(&self) -> SxMatrix {
        Self::column(self.data.clone())
    }

    pub fn transpose(&self) -> SxMatrix {
        let mut data = Vec::with_capacity(self.data.len());
        for r in 0..self.rows {
            for c in 0..self.cols {
                data.push(self.data[c * self.rows + r].clone());
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    /// Matrix product
    pub fn mul(&self, rhs: &SxMatrix) -> Result<SxMatrix> {
        if self.cols != rhs.rows {
            return Err(SymError::dimension(
                "SxMatrix::mul",
                format!("{} rows", self.cols),
                format!("{} rows", rhs.rows),
            ));
        }
        let mut data = Vec::with_capacity(self.rows * rhs.cols);
        for c in 0..rhs.cols {
            for r in 0..self.rows {
                let mut acc = Sx::zero();
                for k in 0..self.cols {
                    let term = &self.data[k * self.rows + r] * &rhs.data[c * rhs.rows + k];
                    acc = acc + term;
                }
                data.push(acc);
            }
        }
        Ok(Self {
            rows: self.rows,
            cols: rhs.cols,
            data,
        })
    }
}

impl fmt::Display for SxMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for r in 0..self.rows {
            if r > 0 {
                write!(f, "; ")?;
            }
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.data[c * self.rows + r])?;
            }
        }
        write!(f, "]")
    }
}

/// Largest matrix [`det`] accepts
///
/// The expansion builds one minor per subset of columns, so graph size and
/// memory grow as `n * 2^n`.
pub const MAX_DET_SIZE: usize = 16;

/// Symbolic determinant
///
/// Laplace expansion along successive rows, memoised on the set of columns
/// still available. Every minor is built once, so the result has
/// `O(n * 2^n)` nodes and contains no divisions. Zero entries are skipped.
pub fn det(m: &SxMatrix) -> Result<Sx> {
    if !m.is_square() {
        return Err(SymError::NotSquare {
            rows: m.rows,
            cols: m.cols,
        });
    }
    let n = m.rows;
    if n == 0 {
        return Ok(Sx::one());
    }
    if n > MAX_DET_SIZE {
        return Err(SymError::InvalidInput(format!(
            "determinant of a {n}x{n} matrix exceeds the supported size {MAX_DET_SIZE}"
        )));
    }
    let mut memo = FxHashMap::default();
    Ok(minor(m, 0, (1u64 << n) - 1, &mut memo))
}

fn minor(m: &SxMatrix, row: usize, cols: u64, memo: &mut FxHashMap<u64, Sx>) -> Sx {
    if row == m.rows {
        return Sx::one();
    }
    if let Some(cached) = memo.get(&cols) {
        return cached.clone();
    }
    let mut acc: Option<Sx> = None;
    let mut position = 0usize;
    for col in 0..m.cols {
        if cols & (1u64 << col) == 0 {
            continue;
        }
        let negative = position % 2 == 1;
        position += 1;
        let entry = &m.data[col * m.rows + row];
        if entry.is_zero() {
            continue;
        }
        let sub = minor(m, row + 1, cols & !(1u64 << col), memo);
        let term = entry * &sub;
        acc = Some(match (acc, negative) {
            (None, false) => term,
            (None, true) => -term,
            (Some(a), false) => a + term,
            (Some(a), true) => a - term,
        });
    }
    let result = acc.unwrap_or_else(Sx::zero);
    memo.insert(cols, result.clone());
    result
}
