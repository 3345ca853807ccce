//! Common test utilities for integration tests

#![allow(dead_code)]

pub const EPSILON: f64 = 1e-9;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON * (1.0 + a.abs().max(b.abs()))
}

pub fn vec_approx_eq(a: &[f64], b: &[f64]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y))
}

/// Diagonal n x n matrix in column-major order
pub fn diagonal(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut m = vec![0.0; n * n];
    for (i, v) in values.iter().enumerate() {
        m[i * n + i] = *v;
    }
    m
}
