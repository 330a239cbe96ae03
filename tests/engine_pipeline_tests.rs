#![cfg(feature = "dev")]

use std::collections::HashSet;

use approx::assert_relative_eq;

use treefit::internals::engine::pipeline::{optimize_constants, OptimizationSettings};
use treefit::internals::primitives::cancel::CancellationToken;
use treefit::internals::primitives::errors::FitError;
use treefit::internals::tree::{InMemoryDataset, NodeId, Symbol, SymbolicExpressionTree, TreeNode};

fn quadratic_data() -> InMemoryDataset {
    let x: Vec<f64> = (0..20).map(|i| -2.0 + 0.2 * i as f64).collect();
    let y = x.iter().map(|x| 3.0 * x * x - 1.5 * x + 0.5).collect();
    InMemoryDataset::new()
        .with_doubles("x", x)
        .unwrap()
        .with_doubles("y", y)
        .unwrap()
}

/// c0 · x² + c1 · x + c2
fn quadratic_tree() -> SymbolicExpressionTree {
    SymbolicExpressionTree::with_program_root(TreeNode::op(
        Symbol::Add,
        vec![
            TreeNode::op(
                Symbol::Mul,
                vec![
                    TreeNode::constant(1.0),
                    TreeNode::op(Symbol::Square, vec![TreeNode::variable("x", 1.0)]),
                ],
            ),
            TreeNode::op(
                Symbol::Mul,
                vec![TreeNode::constant(1.0), TreeNode::variable("x", 1.0)],
            ),
            TreeNode::constant(0.0),
        ],
    ))
}

fn all_rows() -> Vec<usize> {
    (0..20).collect()
}

fn plain_settings(max_iterations: usize) -> OptimizationSettings {
    OptimizationSettings {
        max_iterations,
        update_variable_weights: false,
        linear_scaling: false,
        ..OptimizationSettings::default()
    }
}

#[test_log::test]
fn test_constants_are_written_back() {
    let tree = quadratic_tree();
    let data = quadratic_data();

    let fitted = optimize_constants(
        &tree,
        &data,
        "y",
        &all_rows(),
        &plain_settings(50),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(fitted.params.len(), 3);
    assert!(fitted.scaling.is_none());
    let values = fitted.tree.leaf_values();
    // Leaves in prefix order: c0, x, c1, x, c2
    assert_relative_eq!(values[0], 3.0, epsilon = 1e-6);
    assert_relative_eq!(values[2], -1.5, epsilon = 1e-6);
    assert_relative_eq!(values[4], 0.5, epsilon = 1e-6);
    // Variable weights were not parameters
    assert_eq!(values[1], 1.0);
    assert_eq!(values[3], 1.0);
}

#[test]
fn test_input_tree_is_untouched() {
    let tree = quadratic_tree();
    let before = tree.clone();
    let data = quadratic_data();

    let _ = optimize_constants(
        &tree,
        &data,
        "y",
        &all_rows(),
        &OptimizationSettings::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(tree, before);
}

#[test]
fn test_linear_scaling_is_reported() {
    let tree = quadratic_tree();
    let data = quadratic_data();

    let fitted = optimize_constants(
        &tree,
        &data,
        "y",
        &all_rows(),
        &OptimizationSettings::default(),
        &CancellationToken::new(),
    )
    .unwrap();

    let scaling = fitted.scaling.expect("scaling requested");
    assert_eq!(scaling.beta, fitted.params[0]);
    assert_eq!(scaling.alpha, fitted.params[1]);
    // Two scaling terms, three constants, two variable weights
    assert_eq!(fitted.params.len(), 7);
}

#[test]
fn test_excluded_constant_stays_fixed() {
    let tree = quadratic_tree();
    let data = quadratic_data();
    let settings = OptimizationSettings {
        excluded_nodes: HashSet::from([NodeId(9)]),
        ..plain_settings(30)
    };

    let fitted = optimize_constants(
        &tree,
        &data,
        "y",
        &all_rows(),
        &settings,
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(fitted.params.len(), 2);
    assert_eq!(fitted.tree.leaf_values()[4], 0.0);
}

#[test]
fn test_vector_variable_fit() {
    let vectors: Vec<Vec<f64>> = (0..8)
        .map(|i| vec![i as f64, 1.0, 0.5 * i as f64])
        .collect();
    let y = vectors.iter().map(|v| 3.0 * v.iter().sum::<f64>()).collect();
    let data = InMemoryDataset::new()
        .with_vectors("v", vectors)
        .unwrap()
        .with_doubles("y", y)
        .unwrap();
    // sum(v · c)
    let tree = SymbolicExpressionTree::with_program_root(TreeNode::op(
        Symbol::Sum,
        vec![TreeNode::op(
            Symbol::Mul,
            vec![TreeNode::variable("v", 1.0), TreeNode::constant(1.0)],
        )],
    ));
    let rows: Vec<usize> = (0..8).collect();

    let fitted = optimize_constants(
        &tree,
        &data,
        "y",
        &rows,
        &plain_settings(20),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(fitted.params.len(), 1);
    assert_relative_eq!(fitted.params[0], 3.0, epsilon = 1e-6);
    assert_relative_eq!(fitted.tree.leaf_values()[1], 3.0, epsilon = 1e-6);
}

#[test]
fn test_error_paths() {
    let data = quadratic_data();
    let token = CancellationToken::new();
    let rows = all_rows();

    let fixed = SymbolicExpressionTree::with_program_root(TreeNode::op(
        Symbol::Mul,
        vec![TreeNode::fixed(2.0), TreeNode::variable("x", 1.0)],
    ));
    assert_eq!(
        optimize_constants(&fixed, &data, "y", &rows, &plain_settings(10), &token).unwrap_err(),
        FitError::DegenerateModel
    );

    let unsupported = SymbolicExpressionTree::with_program_root(TreeNode::op(
        Symbol::Min,
        vec![TreeNode::constant(1.0), TreeNode::variable("x", 1.0)],
    ));
    assert!(matches!(
        optimize_constants(&unsupported, &data, "y", &rows, &plain_settings(10), &token),
        Err(FitError::UnsupportedSymbol { .. })
    ));

    let singular = SymbolicExpressionTree::with_program_root(TreeNode::op(
        Symbol::Sqrt,
        vec![TreeNode::op(
            Symbol::Mul,
            vec![TreeNode::constant(0.0), TreeNode::op(Symbol::Square, vec![TreeNode::variable("x", 1.0)])],
        )],
    ));
    assert!(matches!(
        optimize_constants(&singular, &data, "y", &rows, &plain_settings(10), &token),
        Err(FitError::NumericalFailure(_))
    ));

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert_eq!(
        optimize_constants(&quadratic_tree(), &data, "y", &rows, &plain_settings(10), &cancelled)
            .unwrap_err(),
        FitError::Cancelled
    );
}
