#![cfg(feature = "dev")]

use std::collections::HashSet;

use treefit::internals::api::*;

#[test]
fn test_defaults() {
    let evaluator = TreeFitBuilder::new().target("y").build().unwrap();
    let config = evaluator.config();

    assert_eq!(config.probability, 1.0);
    assert_eq!(config.iterations, 10);
    assert_eq!(config.optimization_rows_percentage, 1.0);
    assert_eq!(config.evaluation_rows_percentage, 1.0);
    assert!(config.update_variable_weights);
    assert!(config.linear_scaling);
    assert!(config.update_constants_in_tree);
    assert!(!config.gradient_check);
    assert!(!config.count_evaluations);
    assert_eq!(config.estimation_limits, EstimationLimits::default());
    assert_eq!(config.training_rows, None);
    assert_eq!(config.target, "y");
    assert!(config.excluded_nodes.is_empty());
    assert_eq!(evaluator.counters(), None);
}

#[test]
fn test_configured_values() {
    let evaluator = TreeFitBuilder::new()
        .target("y")
        .probability(0.25)
        .iterations(3)
        .optimization_rows_percentage(0.5)
        .evaluation_rows_percentage(0.75)
        .update_variable_weights(false)
        .linear_scaling(false)
        .update_constants_in_tree(false)
        .gradient_check(true)
        .count_evaluations(true)
        .training_rows(vec![1, 2, 3])
        .excluded_nodes(HashSet::from([NodeId(2)]))
        .estimation_limits(-10.0, 10.0)
        .build()
        .unwrap();
    let config = evaluator.config();

    assert_eq!(config.probability, 0.25);
    assert_eq!(config.iterations, 3);
    assert_eq!(config.optimization_rows_percentage, 0.5);
    assert_eq!(config.evaluation_rows_percentage, 0.75);
    assert!(!config.update_variable_weights);
    assert!(!config.linear_scaling);
    assert!(!config.update_constants_in_tree);
    assert!(config.gradient_check);
    assert_eq!(config.estimation_limits, EstimationLimits::new(-10.0, 10.0));
    assert_eq!(config.training_rows, Some(vec![1, 2, 3]));
    assert!(config.excluded_nodes.contains(&NodeId(2)));
    assert_eq!(evaluator.counters(), Some(FitCounters::default()));
}

#[test]
fn test_duplicate_parameter() {
    let err = TreeFitBuilder::new()
        .target("y")
        .iterations(5)
        .iterations(6)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        FitError::DuplicateParameter {
            parameter: "iterations"
        }
    );
}

#[test]
fn test_duplicates_are_reported_before_values() {
    let err = TreeFitBuilder::new()
        .probability(2.0)
        .linear_scaling(true)
        .linear_scaling(false)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        FitError::DuplicateParameter {
            parameter: "linear_scaling"
        }
    );
}

#[test]
fn test_invalid_values() {
    let build = |b: TreeFitBuilder| b.target("y").build().unwrap_err();

    assert_eq!(
        build(TreeFitBuilder::new().probability(-0.5)),
        FitError::InvalidProbability(-0.5)
    );
    assert_eq!(
        build(TreeFitBuilder::new().iterations(20_000)),
        FitError::InvalidIterations(20_000)
    );
    assert_eq!(
        build(TreeFitBuilder::new().optimization_rows_percentage(0.0)),
        FitError::InvalidPercentage {
            parameter: "optimization_rows_percentage",
            value: 0.0,
        }
    );
    assert_eq!(
        build(TreeFitBuilder::new().evaluation_rows_percentage(1.5)),
        FitError::InvalidPercentage {
            parameter: "evaluation_rows_percentage",
            value: 1.5,
        }
    );
    assert_eq!(
        build(TreeFitBuilder::new().estimation_limits(1.0, 0.0)),
        FitError::InvalidEstimationLimits {
            lower: 1.0,
            upper: 0.0,
        }
    );
    assert_eq!(
        build(TreeFitBuilder::new().training_rows(Vec::new())),
        FitError::EmptyRows
    );
}

#[test]
fn test_missing_target() {
    assert_eq!(
        TreeFitBuilder::new().iterations(5).build().unwrap_err(),
        FitError::MissingParameter { parameter: "target" }
    );
}

#[test]
fn test_prelude_alias() {
    use treefit::prelude::TreeFit;

    let evaluator = TreeFit::new().target("y").iterations(0).build().unwrap();
    assert_eq!(evaluator.config().iterations, 0);
}
