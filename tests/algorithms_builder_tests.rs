#![cfg(feature = "dev")]

use std::collections::HashSet;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use treefit::internals::algorithms::binder::bind;
use treefit::internals::algorithms::builder::{BuildOptions, ParameterKind, TermGraphBuilder};
use treefit::internals::algorithms::term::DifferentiableModel;
use treefit::internals::algorithms::writeback::{tunable_leaf_count, write_back, WriteBackOptions};
use treefit::internals::primitives::errors::FitError;
use treefit::internals::tree::{
    EvaluationTrace, InMemoryDataset, Interpreter, NodeId, Shape, Symbol, SymbolicExpressionTree,
    TreeNode,
};

fn op(symbol: Symbol, children: Vec<TreeNode>) -> TreeNode {
    TreeNode::op(symbol, children)
}

fn c(value: f64) -> TreeNode {
    TreeNode::constant(value)
}

fn x() -> TreeNode {
    TreeNode::variable("x", 1.0)
}

fn data() -> InMemoryDataset {
    InMemoryDataset::new()
        .with_doubles("x", (1..=12).map(|i| 0.25 * i as f64).collect())
        .unwrap()
        .with_strings(
            "g",
            (0..12).map(|i| ["a", "b", "c"][i % 3]).collect::<Vec<_>>(),
        )
        .unwrap()
        .with_doubles("y", (0..12).map(|i| i as f64).collect())
        .unwrap()
}

/// Random tree over supported symbols.
fn random_tree(rng: &mut StdRng, depth: usize) -> TreeNode {
    if depth == 0 || rng.random_bool(0.3) {
        return match rng.random_range(0..6) {
            0 => c(rng.random_range(-2.0..2.0)),
            1 => TreeNode::fixed(rng.random_range(-2.0..2.0)),
            2 => TreeNode::variable("x", rng.random_range(0.5..1.5)),
            3 => TreeNode::lagged_variable("x", 0.7, -1),
            4 => TreeNode::binary_factor("g", "a", rng.random_range(-1.0..1.0)),
            _ => TreeNode::factor("g", vec![("a", 0.1), ("b", 0.2), ("c", 0.3)]),
        };
    }
    let choice = rng.random_range(0..6);
    let mut child = || random_tree(rng, depth - 1);
    match choice {
        0 => {
            let (a, b) = (child(), child());
            op(Symbol::Add, vec![a, b])
        }
        1 => {
            let (a, b) = (child(), child());
            op(Symbol::Mul, vec![a, b])
        }
        2 => {
            let (a, b, d) = (child(), child(), child());
            op(Symbol::Sub, vec![a, b, d])
        }
        3 => op(Symbol::Sin, vec![child()]),
        4 => op(Symbol::Power, vec![child(), c(2.0)]),
        _ => {
            let (a, b) = (child(), child());
            op(Symbol::AnalyticQuotient, vec![a, b])
        }
    }
}

#[test]
fn test_parameter_slots_of_linear_tree() {
    // ProgramRoot(Add(Mul(c 0.5, x), c 0.0))
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Add,
        vec![op(Symbol::Mul, vec![c(0.5), x()]), c(0.0)],
    ));

    let model = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap();
    let slots: Vec<(usize, ParameterKind, f64)> = model
        .parameters
        .iter()
        .map(|p| (p.node.0, p.kind.clone(), p.initial))
        .collect();
    assert_eq!(
        slots,
        vec![
            (3, ParameterKind::Constant, 0.5),
            (4, ParameterKind::VariableWeight, 1.0),
            (5, ParameterKind::Constant, 0.0),
        ]
    );
    assert_eq!(model.inputs.len(), 1);
    assert_eq!(model.inputs[0].variable, "x");
    assert!(!model.linear_scaling);
}

#[test]
fn test_linear_scaling_parameters_come_first() {
    let tree = SymbolicExpressionTree::with_program_root(op(Symbol::Mul, vec![c(3.0), x()]));
    let options = BuildOptions {
        include_linear_scaling: true,
        ..BuildOptions::default()
    };

    let mut model = TermGraphBuilder::build(&tree, &options, None).unwrap();
    assert_eq!(model.parameters[0].kind, ParameterKind::ScalingOffset);
    assert_eq!(model.parameters[0].initial, 0.0);
    assert_eq!(model.parameters[1].kind, ParameterKind::ScalingFactor);
    assert_eq!(model.parameters[1].initial, 1.0);
    assert_eq!(model.initial_parameters(), vec![0.0, 1.0, 3.0, 1.0]);

    // α·(c·w·x) + β
    let value = model.value(&[0.5, 2.0, 3.0, 1.0], &[4.0]);
    assert_eq!(value, 24.5);
}

#[test]
fn test_weights_and_exclusions() {
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Add,
        vec![op(Symbol::Mul, vec![c(2.0), x()]), c(1.0)],
    ));

    let no_weights = BuildOptions {
        include_variable_weights: false,
        ..BuildOptions::default()
    };
    let model = TermGraphBuilder::build(&tree, &no_weights, None).unwrap();
    assert_eq!(model.initial_parameters(), vec![2.0, 1.0]);

    let excluded = BuildOptions {
        excluded_nodes: HashSet::from([NodeId(3)]),
        ..BuildOptions::default()
    };
    let mut model = TermGraphBuilder::build(&tree, &excluded, None).unwrap();
    let nodes: Vec<usize> = model.parameters.iter().map(|p| p.node.0).collect();
    assert_eq!(nodes, vec![4, 5]);

    // Excluded constant is baked in as a literal
    assert_eq!(model.value(&[1.0, 1.0], &[3.0]), 7.0);
}

#[test]
fn test_degenerate_model() {
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Mul,
        vec![TreeNode::fixed(2.0), x()],
    ));
    let options = BuildOptions {
        include_variable_weights: false,
        ..BuildOptions::default()
    };
    let model = TermGraphBuilder::build(&tree, &options, None).unwrap();
    assert!(model.is_degenerate());
    assert_eq!(model.parameter_count(), 0);
}

#[test]
fn test_factor_parameters_follow_stored_order() {
    let tree = SymbolicExpressionTree::with_program_root(TreeNode::factor(
        "g",
        vec![("b", 2.0), ("a", 1.0)],
    ));
    let model = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap();

    let kinds: Vec<ParameterKind> = model.parameters.iter().map(|p| p.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            ParameterKind::FactorWeight {
                category: "b".to_string()
            },
            ParameterKind::FactorWeight {
                category: "a".to_string()
            },
        ]
    );
    let categories: Vec<Option<&str>> = model
        .inputs
        .iter()
        .map(|s| s.category.as_deref())
        .collect();
    assert_eq!(categories, vec![Some("b"), Some("a")]);
}

#[test]
fn test_shared_inputs_are_deduplicated() {
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Add,
        vec![x(), TreeNode::variable("x", 2.0)],
    ));
    let model = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap();
    assert_eq!(model.inputs.len(), 1);
    assert_eq!(model.parameters.len(), 2);
}

#[test]
fn test_power_exponent_is_not_a_parameter() {
    let tree = SymbolicExpressionTree::with_program_root(op(Symbol::Power, vec![x(), c(3.0)]));
    let mut model = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap();
    assert_eq!(model.initial_parameters(), vec![1.0]);
    assert_eq!(model.value(&[1.0], &[2.0]), 8.0);

    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Root,
        vec![x(), TreeNode::fixed(2.0)],
    ));
    let mut model = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap();
    assert_relative_eq!(model.value(&[1.0], &[9.0]), 3.0, epsilon = 1e-12);
}

#[test]
fn test_invalid_exponents_are_rejected() {
    let power_error = FitError::UnsupportedSymbol {
        node: NodeId(1),
        symbol: "Power".to_string(),
    };

    let fractional =
        SymbolicExpressionTree::with_program_root(op(Symbol::Power, vec![x(), c(2.5)]));
    assert_eq!(
        TermGraphBuilder::build(&fractional, &BuildOptions::default(), None).unwrap_err(),
        power_error
    );

    let compound = SymbolicExpressionTree::with_program_root(op(
        Symbol::Power,
        vec![x(), op(Symbol::Add, vec![c(1.0), c(1.0)])],
    ));
    assert_eq!(
        TermGraphBuilder::build(&compound, &BuildOptions::default(), None).unwrap_err(),
        power_error
    );

    let zeroth_root =
        SymbolicExpressionTree::with_program_root(op(Symbol::Root, vec![x(), c(0.0)]));
    assert_eq!(
        TermGraphBuilder::build(&zeroth_root, &BuildOptions::default(), None).unwrap_err(),
        FitError::UnsupportedSymbol {
            node: NodeId(1),
            symbol: "Root".to_string(),
        }
    );
}

#[test]
fn test_unsupported_symbol_at_any_position() {
    // ProgramRoot(Add(Mul(c, x), Sub(Sin(x), Div(c, Exp(x)))))
    let base = SymbolicExpressionTree::with_program_root(op(
        Symbol::Add,
        vec![
            op(Symbol::Mul, vec![c(1.0), x()]),
            op(
                Symbol::Sub,
                vec![
                    op(Symbol::Sin, vec![x()]),
                    op(Symbol::Div, vec![c(2.0), op(Symbol::Exp, vec![x()])]),
                ],
            ),
        ],
    ));
    assert!(TermGraphBuilder::build(&base, &BuildOptions::default(), None).is_ok());

    for position in 1..base.len() {
        for replacement in [
            TreeNode::leaf(Symbol::Unknown("Gamma".to_string())),
            op(Symbol::IfThenElse, vec![c(1.0), x(), c(0.0)]),
            op(Symbol::Max, vec![x(), c(0.0)]),
        ] {
            let name = replacement.symbol.name().to_string();
            let mut tree = base.clone();
            if let Some(node) = tree.node_mut(NodeId(position)) {
                *node = replacement;
            }
            let err = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap_err();
            assert_eq!(
                err,
                FitError::UnsupportedSymbol {
                    node: NodeId(position),
                    symbol: name,
                }
            );
        }
    }
}

#[test]
fn test_slot_leaf_bijection_on_random_trees() {
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let tree = SymbolicExpressionTree::with_program_root(random_tree(&mut rng, 4));
        let include_variable_weights = rng.random_bool(0.5);
        let include_linear_scaling = rng.random_bool(0.5);
        let excluded_nodes: HashSet<NodeId> = (0..tree.len())
            .filter(|_| rng.random_bool(0.2))
            .map(NodeId)
            .collect();

        let build_options = BuildOptions {
            include_variable_weights,
            include_linear_scaling,
            excluded_nodes: excluded_nodes.clone(),
        };
        let write_options = WriteBackOptions {
            include_variable_weights,
            include_linear_scaling,
            excluded_nodes,
        };
        let offset = if include_linear_scaling { 2 } else { 0 };

        let model = TermGraphBuilder::build(&tree, &build_options, None).unwrap();
        let n = model.parameters.len();
        assert_eq!(n, offset + tunable_leaf_count(&tree, &write_options));

        // Writing the initial values back is the identity
        let mut copy = tree.clone();
        assert_eq!(
            write_back(&mut copy, &model.initial_parameters(), &write_options).unwrap(),
            n
        );
        assert_eq!(copy, tree);

        // Distinct values land in the slots they came from
        let params: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let mut written = tree.clone();
        write_back(&mut written, &params, &write_options).unwrap();
        let rebuilt = TermGraphBuilder::build(&written, &build_options, None).unwrap();
        assert_eq!(rebuilt.initial_parameters()[offset..], params[offset..]);
        for (before, after) in model.parameters.iter().zip(&rebuilt.parameters) {
            assert_eq!(before.node, after.node);
            assert_eq!(before.kind, after.kind);
        }
    }
}

#[test]
fn test_graph_agrees_with_interpreter() {
    let data = data();
    let rows: Vec<usize> = (1..12).collect();
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..100 {
        let tree = SymbolicExpressionTree::with_program_root(random_tree(&mut rng, 4));
        let mut model = TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap();
        let (x, _) = bind(&data, &model.inputs, "y", &rows).unwrap();
        let params = model.initial_parameters();

        for (i, &row) in rows.iter().enumerate() {
            let expected = Interpreter::evaluate_row(&tree, &data, row).unwrap();
            let actual = model.value(&params, x.row(i));
            if expected.is_finite() {
                assert_relative_eq!(actual, expected, epsilon = 1e-9, max_relative = 1e-9);
            } else {
                assert!(!actual.is_finite());
            }
        }
    }
}

#[test]
fn test_gradient_matches_finite_differences() {
    // ProgramRoot(Add(Mul(c 1.5, Sin(x)), Div(c 2, Add(c 1, Square(x)))))
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Add,
        vec![
            op(
                Symbol::Mul,
                vec![c(1.5), op(Symbol::Sin, vec![TreeNode::variable("x", 0.8)])],
            ),
            op(
                Symbol::Div,
                vec![c(2.0), op(Symbol::Add, vec![c(1.0), op(Symbol::Square, vec![x()])])],
            ),
        ],
    ));
    let options = BuildOptions {
        include_linear_scaling: true,
        ..BuildOptions::default()
    };
    let mut model = TermGraphBuilder::build(&tree, &options, None).unwrap();
    let params = vec![0.3, 1.7, 1.5, 0.8, 2.0, 1.0, 1.0];
    assert_eq!(params.len(), model.parameter_count());

    let mut gradient = vec![0.0; params.len()];
    for &input in &[0.4, 1.1, 2.3] {
        model.value_and_gradient(&params, &[input], &mut gradient);
        for j in 0..params.len() {
            let h = 1e-6;
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[j] += h;
            minus[j] -= h;
            let numeric =
                (model.value(&plus, &[input]) - model.value(&minus, &[input])) / (2.0 * h);
            assert_relative_eq!(gradient[j], numeric, epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

#[test]
fn test_vector_variable_expands_to_elements() {
    let data = InMemoryDataset::new()
        .with_vectors("v", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        .unwrap()
        .with_doubles("y", vec![0.0, 1.0])
        .unwrap();
    // ProgramRoot(Sum(Mul(v, c 2)))
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Sum,
        vec![op(Symbol::Mul, vec![TreeNode::variable("v", 1.0), c(2.0)])],
    ));
    let rows = [0, 1];

    let trace = Interpreter::evaluation_trace(&tree, &data, &rows).unwrap();
    let mut model = TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap();

    // One shared weight, one constant
    let nodes: Vec<usize> = model.parameters.iter().map(|p| p.node.0).collect();
    assert_eq!(nodes, vec![3, 4]);
    let indices: Vec<Option<usize>> = model.inputs.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);

    let (x, _) = bind(&data, &model.inputs, "y", &rows).unwrap();
    let params = model.initial_parameters();
    assert_eq!(model.value(&params, x.row(0)), 12.0);
    assert_eq!(model.value(&params, x.row(1)), 30.0);

    // d/dw = 2·Σv, d/dc = Σv
    let mut gradient = [0.0; 2];
    model.value_and_gradient(&params, x.row(1), &mut gradient);
    assert_eq!(gradient, [30.0, 15.0]);
}

#[test]
fn test_vector_aggregates_in_graph() {
    let data = InMemoryDataset::new()
        .with_vectors("v", vec![vec![1.0, 2.0, 4.0], vec![3.0, 3.0, 6.0]])
        .unwrap()
        .with_doubles("y", vec![0.0, 1.0])
        .unwrap();
    let rows = [0, 1];

    for symbol in [
        Symbol::Mean,
        Symbol::Variance,
        Symbol::StandardDeviation,
        Symbol::Length,
    ] {
        let tree = SymbolicExpressionTree::with_program_root(op(
            symbol,
            vec![TreeNode::variable("v", 1.5)],
        ));
        let trace = Interpreter::evaluation_trace(&tree, &data, &rows).unwrap();
        let mut model =
            TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap();
        let (x, _) = bind(&data, &model.inputs, "y", &rows).unwrap();
        let params = model.initial_parameters();

        for (i, &row) in rows.iter().enumerate() {
            let expected = Interpreter::evaluate_row(&tree, &data, row).unwrap();
            assert_relative_eq!(model.value(&params, x.row(i)), expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_variance_of_single_element_is_nan() {
    let data = InMemoryDataset::new()
        .with_vectors("v", vec![vec![2.0], vec![3.0]])
        .unwrap()
        .with_doubles("y", vec![0.0, 1.0])
        .unwrap();
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Variance,
        vec![TreeNode::variable("v", 1.0)],
    ));
    let trace = Interpreter::evaluation_trace(&tree, &data, &[0, 1]).unwrap();
    let mut model = TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap();
    let (x, _) = bind(&data, &model.inputs, "y", &[0, 1]).unwrap();

    let params = model.initial_parameters();
    assert!(model.value(&params, x.row(0)).is_nan());
}

#[test]
fn test_broadcast_mismatch_from_trace() {
    // ProgramRoot(Sum(Add(v, w))) with |v| = 3, |w| = 2
    let tree = SymbolicExpressionTree::with_program_root(op(
        Symbol::Sum,
        vec![op(
            Symbol::Add,
            vec![TreeNode::variable("v", 1.0), TreeNode::variable("w", 1.0)],
        )],
    ));
    let trace = EvaluationTrace::from_shapes(vec![
        Shape::Scalar,
        Shape::Scalar,
        Shape::Vector(3),
        Shape::Vector(3),
        Shape::Vector(2),
    ]);

    assert_eq!(
        TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap_err(),
        FitError::BroadcastMismatch {
            node: NodeId(2),
            left: 3,
            right: 2,
        }
    );
}

#[test]
fn test_length_one_vector_broadcasts() {
    let data = InMemoryDataset::new()
        .with_vectors("a", vec![vec![1.0], vec![2.0]])
        .unwrap()
        .with_vectors("b", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        .unwrap()
        .with_doubles("y", vec![0.0, 1.0])
        .unwrap();
    let rows = [0, 1];
    let a = || TreeNode::variable("a", 1.0);
    let b = || TreeNode::variable("b", 1.0);

    // ProgramRoot(Sum(Add(a, b))) in both operand orders
    for children in [vec![a(), b()], vec![b(), a()]] {
        let tree = SymbolicExpressionTree::with_program_root(op(
            Symbol::Sum,
            vec![op(Symbol::Add, children)],
        ));
        let trace = Interpreter::evaluation_trace(&tree, &data, &rows).unwrap();
        assert_eq!(trace.shape(NodeId(2)), Some(Shape::Vector(3)));

        let mut model =
            TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap();
        let (x, _) = bind(&data, &model.inputs, "y", &rows).unwrap();
        let params = model.initial_parameters();
        assert_eq!(model.value(&params, x.row(0)), 9.0);
        assert_eq!(model.value(&params, x.row(1)), 21.0);
    }
}

#[test]
fn test_aggregate_of_scalar_is_rejected() {
    for symbol in [
        Symbol::Sum,
        Symbol::Mean,
        Symbol::Variance,
        Symbol::StandardDeviation,
        Symbol::Length,
    ] {
        let name = symbol.name().to_string();
        let tree = SymbolicExpressionTree::with_program_root(op(symbol, vec![x()]));
        let expected = FitError::UnsupportedSymbol {
            node: NodeId(1),
            symbol: name,
        };

        // Without a trace every child is scalar
        assert_eq!(
            TermGraphBuilder::build(&tree, &BuildOptions::default(), None).unwrap_err(),
            expected
        );

        let trace = Interpreter::evaluation_trace(&tree, &data(), &[0, 1, 2]).unwrap();
        assert_eq!(trace.shape(NodeId(2)), Some(Shape::Scalar));
        assert_eq!(
            TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap_err(),
            expected
        );
    }
}

#[test]
fn test_vector_output_is_rejected() {
    let tree = SymbolicExpressionTree::with_program_root(TreeNode::variable("v", 1.0));
    let trace = EvaluationTrace::from_shapes(vec![Shape::Vector(4), Shape::Vector(4)]);

    assert_eq!(
        TermGraphBuilder::build(&tree, &BuildOptions::default(), Some(&trace)).unwrap_err(),
        FitError::BroadcastMismatch {
            node: NodeId(0),
            left: 4,
            right: 1,
        }
    );
}
