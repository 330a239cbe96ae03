//! High-level API for constant optimization.
//!
//! ## Purpose
//!
//! This module provides the primary user-facing entry point. It implements a
//! fluent builder for configuring the optimization gate and produces a
//! validated [`ConstantOptimizationEvaluator`].
//!
//! ## Design notes
//!
//! * **Ergonomic**: Fluent builder with sensible defaults for all parameters.
//! * **Validated**: Parameters are validated when `.build()` is called.
//! * **Strict**: Setting a parameter twice is reported as an error.
//!
//! ### Configuration Flow
//!
//! 1. Create a [`TreeFitBuilder`] via `TreeFit::new()`.
//! 2. Chain configuration methods (`.iterations()`, `.probability()`, etc.).
//! 3. Call `.build()` to obtain the evaluator.

use std::collections::HashSet;

// Internal dependencies
use crate::engine::validator::Validator;
use crate::gate::EvaluatorConfig;

// Publicly re-exported types
pub use crate::algorithms::writeback::LinearScaling;
pub use crate::evaluation::quality::EstimationLimits;
pub use crate::gate::{ConstantOptimizationEvaluator, EvaluationResult};
pub use crate::primitives::cancel::CancellationToken;
pub use crate::primitives::counters::FitCounters;
pub use crate::primitives::errors::FitError;
pub use crate::tree::{
    Column, Dataset, InMemoryDataset, NodeId, Symbol, SymbolicExpressionTree, TreeNode,
    VariableType,
};

/// Fluent builder for configuring constant optimization.
#[derive(Debug, Clone, Default)]
pub struct TreeFitBuilder {
    /// Probability of optimizing a tree, in `[0, 1]`.
    pub probability: Option<f64>,

    /// Solver iteration budget.
    pub iterations: Option<usize>,

    /// Fraction of training rows used for fitting.
    pub optimization_rows_percentage: Option<f64>,

    /// Fraction of training rows used for the reported quality.
    pub evaluation_rows_percentage: Option<f64>,

    /// Optimize variable and factor weights.
    pub update_variable_weights: Option<bool>,

    /// Fit `α·f(x) + β` around the tree.
    pub linear_scaling: Option<bool>,

    /// Return trees with optimized values.
    pub update_constants_in_tree: Option<bool>,

    /// Prediction clamp used for quality.
    pub estimation_limits: Option<(f64, f64)>,

    /// Finite-difference gradient check.
    pub gradient_check: Option<bool>,

    /// Accumulate evaluation counters.
    pub count_evaluations: Option<bool>,

    /// Training rows.
    pub training_rows: Option<Vec<usize>>,

    /// Target variable.
    pub target: Option<String>,

    /// Nodes whose values stay fixed.
    pub excluded_nodes: Option<HashSet<NodeId>>,

    /// Tracks if any parameter was set multiple times (for validation).
    #[doc(hidden)]
    pub duplicate_param: Option<&'static str>,
}

impl TreeFitBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the probability of optimizing a tree (default `1.0`).
    pub fn probability(mut self, value: f64) -> Self {
        if self.probability.is_some() {
            self.duplicate_param = Some("probability");
        }
        self.probability = Some(value);
        self
    }

    /// Set the solver iteration budget (default `10`).
    pub fn iterations(mut self, value: usize) -> Self {
        if self.iterations.is_some() {
            self.duplicate_param = Some("iterations");
        }
        self.iterations = Some(value);
        self
    }

    /// Set the fraction of training rows used for fitting (default `1.0`).
    pub fn optimization_rows_percentage(mut self, value: f64) -> Self {
        if self.optimization_rows_percentage.is_some() {
            self.duplicate_param = Some("optimization_rows_percentage");
        }
        self.optimization_rows_percentage = Some(value);
        self
    }

    /// Set the fraction of training rows used for quality (default `1.0`).
    pub fn evaluation_rows_percentage(mut self, value: f64) -> Self {
        if self.evaluation_rows_percentage.is_some() {
            self.duplicate_param = Some("evaluation_rows_percentage");
        }
        self.evaluation_rows_percentage = Some(value);
        self
    }

    /// Optimize variable and factor weights (default `true`).
    pub fn update_variable_weights(mut self, value: bool) -> Self {
        if self.update_variable_weights.is_some() {
            self.duplicate_param = Some("update_variable_weights");
        }
        self.update_variable_weights = Some(value);
        self
    }

    /// Fit `α·f(x) + β` around the tree (default `true`).
    pub fn linear_scaling(mut self, value: bool) -> Self {
        if self.linear_scaling.is_some() {
            self.duplicate_param = Some("linear_scaling");
        }
        self.linear_scaling = Some(value);
        self
    }

    /// Return trees with optimized values (default `true`).
    pub fn update_constants_in_tree(mut self, value: bool) -> Self {
        if self.update_constants_in_tree.is_some() {
            self.duplicate_param = Some("update_constants_in_tree");
        }
        self.update_constants_in_tree = Some(value);
        self
    }

    /// Run a finite-difference gradient check before fitting (default `false`).
    pub fn gradient_check(mut self, value: bool) -> Self {
        if self.gradient_check.is_some() {
            self.duplicate_param = Some("gradient_check");
        }
        self.gradient_check = Some(value);
        self
    }

    /// Accumulate evaluation counters across calls (default `false`).
    pub fn count_evaluations(mut self, value: bool) -> Self {
        if self.count_evaluations.is_some() {
            self.duplicate_param = Some("count_evaluations");
        }
        self.count_evaluations = Some(value);
        self
    }

    /// Restrict fitting and evaluation to these rows (default: all rows).
    pub fn training_rows(mut self, value: Vec<usize>) -> Self {
        if self.training_rows.is_some() {
            self.duplicate_param = Some("training_rows");
        }
        self.training_rows = Some(value);
        self
    }

    /// Set the target variable (required).
    pub fn target(mut self, value: &str) -> Self {
        if self.target.is_some() {
            self.duplicate_param = Some("target");
        }
        self.target = Some(value.to_string());
        self
    }

    /// Keep the values of these nodes fixed.
    pub fn excluded_nodes(mut self, value: HashSet<NodeId>) -> Self {
        if self.excluded_nodes.is_some() {
            self.duplicate_param = Some("excluded_nodes");
        }
        self.excluded_nodes = Some(value);
        self
    }

    /// Clamp predictions to `[lower, upper]` before scoring.
    pub fn estimation_limits(mut self, lower: f64, upper: f64) -> Self {
        if self.estimation_limits.is_some() {
            self.duplicate_param = Some("estimation_limits");
        }
        self.estimation_limits = Some((lower, upper));
        self
    }

    /// Validate the configuration and create the evaluator.
    pub fn build(self) -> Result<ConstantOptimizationEvaluator, FitError> {
        // Check for duplicate parameter configuration
        Validator::validate_no_duplicates(self.duplicate_param)?;

        let probability = self.probability.unwrap_or(1.0);
        Validator::validate_probability(probability)?;

        let iterations = self.iterations.unwrap_or(10);
        Validator::validate_iterations(iterations)?;

        let optimization_rows_percentage = self.optimization_rows_percentage.unwrap_or(1.0);
        Validator::validate_percentage("optimization_rows_percentage", optimization_rows_percentage)?;

        let evaluation_rows_percentage = self.evaluation_rows_percentage.unwrap_or(1.0);
        Validator::validate_percentage("evaluation_rows_percentage", evaluation_rows_percentage)?;

        let limits = match self.estimation_limits {
            Some((lower, upper)) => {
                Validator::validate_estimation_limits(lower, upper)?;
                EstimationLimits::new(lower, upper)
            }
            None => EstimationLimits::default(),
        };

        if let Some(rows) = &self.training_rows {
            if rows.is_empty() {
                return Err(FitError::EmptyRows);
            }
        }

        let target = self.target.ok_or(FitError::MissingParameter { parameter: "target" })?;

        Ok(ConstantOptimizationEvaluator::new(EvaluatorConfig {
            probability,
            iterations,
            optimization_rows_percentage,
            evaluation_rows_percentage,
            update_variable_weights: self.update_variable_weights.unwrap_or(true),
            linear_scaling: self.linear_scaling.unwrap_or(true),
            update_constants_in_tree: self.update_constants_in_tree.unwrap_or(true),
            estimation_limits: limits,
            gradient_check: self.gradient_check.unwrap_or(false),
            count_evaluations: self.count_evaluations.unwrap_or(false),
            training_rows: self.training_rows,
            target,
            excluded_nodes: self.excluded_nodes.unwrap_or_default(),
        }))
    }
}
