//! Gradient of the determinant checked against cofactor matrices

mod common;

use common::{diagonal, vec_approx_eq};
use rstest::rstest;
use rustc_hash::FxHashMap;
use symgrad::ad::gradient;
use symgrad::prelude::*;
use symgrad::{DetGradPipeline, PipelineConfig};

fn gradient_function(n: usize) -> SxFunction {
    DetGradPipeline::new(PipelineConfig::default().with_size(n))
        .build_gradient()
        .unwrap()
}

#[rstest]
#[case(vec![3.0])]
#[case(vec![2.0, 5.0])]
#[case(vec![2.0, 3.0, 4.0])]
#[case(vec![1.0, 2.0, 3.0, 4.0, 5.0])]
fn test_diagonal(#[case] diag: Vec<f64>) {
    let n = diag.len();
    let mut g = gradient_function(n);

    // d det / d a_ii is the product of the other diagonal entries
    let expected: Vec<f64> = (0..n)
        .map(|i| {
            diag.iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, v)| v)
                .product()
        })
        .collect();

    let actual = g.call(&diagonal(&diag)).unwrap();
    assert!(vec_approx_eq(&actual, &diagonal(&expected)), "got {actual:?}");
}

#[test]
fn test_two_by_two() {
    // [a c; b d] stored as [a, b, c, d]
    let mut g = gradient_function(2);
    let actual = g.call(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(actual, vec![4.0, -3.0, -2.0, 1.0]);
}

#[test]
fn test_general_three_by_three() {
    // rows [1 2 0], [0 1 3], [4 0 1]; det = 25
    let input = [1.0, 0.0, 4.0, 2.0, 1.0, 0.0, 0.0, 3.0, 1.0];
    let cofactors = [1.0, -2.0, 6.0, 12.0, 1.0, -3.0, -4.0, 8.0, 1.0];

    let mut g = gradient_function(3);
    let actual = g.call(&input).unwrap();
    assert!(vec_approx_eq(&actual, &cofactors), "got {actual:?}");

    // Laplace along all rows at once: sum a_ij * c_ij = n * det
    let total: f64 = input.iter().zip(&actual).map(|(a, c)| a * c).sum();
    assert!((total - 75.0).abs() < 1e-9);
}

#[test]
fn test_symbolic_gradient_matches_function() {
    let x = SxMatrix::symbolic("x", 3, 3);
    let f = det(&x).unwrap();
    let grad = gradient(&f, x.data());

    let input = [0.3, -1.2, 0.7, 2.0, 0.5, -0.4, 1.1, 0.9, -2.5];
    let values: FxHashMap<usize, f64> = x
        .data()
        .iter()
        .zip(input)
        .map(|(s, v)| (s.id(), v))
        .collect();
    let symbolic: Vec<f64> = grad.iter().map(|e| e.eval_with(&values).unwrap()).collect();

    let mut g = gradient_function(3);
    assert!(vec_approx_eq(&symbolic, &g.call(&input).unwrap()));
}

#[test]
fn test_seven_by_seven_builds() {
    let g = gradient_function(7);
    assert_eq!(g.n_in().unwrap(), 1);
    assert_eq!(g.n_out().unwrap(), 1);
    assert!(g.n_elementary_ops().unwrap() > 49);
}

#[test]
fn test_wrong_input_length_is_rejected() {
    let mut g = gradient_function(2);
    assert!(matches!(
        g.set_input(0, &[1.0, 2.0, 3.0]),
        Err(SymError::DimensionMismatch { .. })
    ));
}
