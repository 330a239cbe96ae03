#![cfg(feature = "dev")]

use approx::assert_relative_eq;

use treefit::internals::evaluation::quality::{evaluate_quality, r_squared, EstimationLimits};
use treefit::internals::primitives::errors::FitError;
use treefit::internals::tree::{InMemoryDataset, Symbol, SymbolicExpressionTree, TreeNode};

#[test]
fn test_clamp() {
    let limits = EstimationLimits::new(-1.0, 2.0);
    assert_eq!(limits.clamp(-5.0), -1.0);
    assert_eq!(limits.clamp(0.5), 0.5);
    assert_eq!(limits.clamp(f64::INFINITY), 2.0);
    assert!(limits.clamp(f64::NAN).is_nan());

    let unbounded = EstimationLimits::default();
    assert_eq!(unbounded.clamp(1e300), 1e300);
    assert_eq!(unbounded.clamp(f64::NEG_INFINITY), f64::MIN);
}

#[test]
fn test_r_squared_is_scale_invariant() {
    let observed = [1.0, 2.0, 3.0, 4.0];
    let estimated: Vec<f64> = observed.iter().map(|v| -7.0 * v + 3.0).collect();
    assert_relative_eq!(
        r_squared(&estimated, &observed, &EstimationLimits::default()),
        1.0,
        epsilon = 1e-12
    );
}

#[test]
fn test_clamping_changes_quality() {
    let observed = [1.0, 2.0, 3.0, 4.0];
    let estimated = [1.0, 2.0, 3.0, 4.0];
    // Clamping flattens the last two estimates
    let limits = EstimationLimits::new(0.0, 2.5);
    let r2 = r_squared(&estimated, &observed, &limits);
    assert!(r2 < 1.0);
    assert!(r2 > 0.5);
}

#[test]
fn test_undefined_quality_is_zero() {
    let limits = EstimationLimits::default();
    // Constant estimates
    assert_eq!(r_squared(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0], &limits), 0.0);
    // NaN estimates
    assert_eq!(r_squared(&[f64::NAN, 2.0, 3.0], &[1.0, 2.0, 3.0], &limits), 0.0);
    // Everything clamped to one value
    let tight = EstimationLimits::new(10.0, 10.0);
    assert_eq!(r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], &tight), 0.0);
}

#[test]
fn test_evaluate_quality() {
    let data = InMemoryDataset::new()
        .with_doubles("x", vec![0.0, 1.0, 2.0, 3.0])
        .unwrap()
        .with_doubles("y", vec![1.0, 3.0, 5.0, 7.0])
        .unwrap();
    let tree = SymbolicExpressionTree::with_program_root(TreeNode::op(
        Symbol::Mul,
        vec![TreeNode::constant(0.3), TreeNode::variable("x", 1.0)],
    ));
    let limits = EstimationLimits::default();

    let quality = evaluate_quality(&tree, &data, "y", &[0, 1, 2, 3], &limits).unwrap();
    assert_relative_eq!(quality, 1.0, epsilon = 1e-12);

    assert_eq!(
        evaluate_quality(&tree, &data, "y", &[], &limits),
        Err(FitError::EmptyRows)
    );
    assert_eq!(
        evaluate_quality(&tree, &data, "missing", &[0, 1], &limits),
        Err(FitError::UnknownVariable("missing".to_string()))
    );
}
