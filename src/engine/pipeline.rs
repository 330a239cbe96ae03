//! Single-attempt constant optimization.
//!
//! ## Purpose
//!
//! This module runs one complete optimization attempt for a tree:
//! build the term graph, bind the data, fit, and write the result into a
//! clone of the tree.
//!
//! ## Design notes
//!
//! * **Borrow, then clone**: The input tree is only read; write-back targets
//!   an owned clone that is returned on success.
//! * **Trace on demand**: An evaluation trace is recorded only when the tree
//!   reads an unindexed vector-valued variable.
//!
//! ## Invariants
//!
//! * Every error leaves the input tree untouched.
//!
//! ## Non-goals
//!
//! * Deciding whether to optimize or whether to keep the result (handled by
//!   the gate).

use std::collections::HashSet;

use crate::algorithms::binder::bind;
use crate::algorithms::builder::{BuildOptions, TermGraphBuilder};
use crate::algorithms::writeback::{write_back, LinearScaling, WriteBackOptions};
use crate::engine::driver::{FitOutcome, FittingDriver};
use crate::primitives::cancel::CancellationToken;
use crate::primitives::counters::FitCounters;
use crate::primitives::errors::FitError;
use crate::tree::dataset::{Dataset, VariableType};
use crate::tree::interpreter::Interpreter;
use crate::tree::node::{NodeId, SymbolicExpressionTree};
use crate::tree::symbol::Symbol;

/// Settings of one optimization attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSettings {
    /// Solver iteration budget.
    pub max_iterations: usize,
    /// Optimize variable and factor weights.
    pub update_variable_weights: bool,
    /// Fit `α·f(x) + β` around the tree.
    pub linear_scaling: bool,
    /// Run the finite-difference gradient check.
    pub gradient_check: bool,
    /// Nodes whose values stay fixed.
    pub excluded_nodes: HashSet<NodeId>,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            update_variable_weights: true,
            linear_scaling: true,
            gradient_check: false,
            excluded_nodes: HashSet::new(),
        }
    }
}

impl OptimizationSettings {
    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            include_variable_weights: self.update_variable_weights,
            include_linear_scaling: self.linear_scaling,
            excluded_nodes: self.excluded_nodes.clone(),
        }
    }

    fn write_back_options(&self) -> WriteBackOptions {
        WriteBackOptions {
            include_variable_weights: self.update_variable_weights,
            include_linear_scaling: self.linear_scaling,
            excluded_nodes: self.excluded_nodes.clone(),
        }
    }
}

/// A successfully optimized tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedTree {
    /// Clone of the input tree with optimized leaf values.
    pub tree: SymbolicExpressionTree,
    /// Full optimized parameter vector.
    pub params: Vec<f64>,
    /// Scaling terms, when linear scaling was fitted.
    pub scaling: Option<LinearScaling>,
    /// Normalized evaluation counts.
    pub counters: FitCounters,
}

/// Optimize the constants of `tree` on `rows` against `target`.
pub fn optimize_constants<D: Dataset + ?Sized>(
    tree: &SymbolicExpressionTree,
    dataset: &D,
    target: &str,
    rows: &[usize],
    settings: &OptimizationSettings,
    cancel: &CancellationToken,
) -> Result<OptimizedTree, FitError> {
    let trace = if reads_vectors(tree, dataset) {
        Some(Interpreter::evaluation_trace(tree, dataset, rows)?)
    } else {
        None
    };

    let mut model = TermGraphBuilder::build(tree, &settings.build_options(), trace.as_ref())?;
    if model.is_degenerate() {
        return Err(FitError::DegenerateModel);
    }

    let (x, y) = bind(dataset, &model.inputs, target, rows)?;
    let initial = model.initial_parameters();

    let driver = FittingDriver::new().with_gradient_check(settings.gradient_check);
    let outcome = driver.fit(
        &mut model,
        &x,
        &y,
        &initial,
        settings.max_iterations,
        cancel,
    )?;

    match outcome {
        FitOutcome::Success { params, counters } => {
            let mut optimized = tree.clone();
            write_back(&mut optimized, &params, &settings.write_back_options())?;
            let scaling = if settings.linear_scaling {
                LinearScaling::from_parameters(&params)
            } else {
                None
            };
            Ok(OptimizedTree {
                tree: optimized,
                params,
                scaling,
                counters,
            })
        }
        FitOutcome::NumericalFailure { reason } => Err(FitError::NumericalFailure(reason)),
    }
}

/// Whether any variable leaf reads a whole vector-valued column.
fn reads_vectors<D: Dataset + ?Sized>(tree: &SymbolicExpressionTree, dataset: &D) -> bool {
    tree.nodes().any(|(_, node)| match &node.symbol {
        Symbol::Variable {
            name, index: None, ..
        } => dataset.has_type(name, VariableType::DoubleVector),
        _ => false,
    })
}
