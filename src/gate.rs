//! Optimization gate: evaluate a tree, optimizing its constants on the way.
//!
//! ## Purpose
//!
//! This module provides [`ConstantOptimizationEvaluator`], the evaluator a
//! genetic-programming search calls for every individual. It decides whether
//! to optimize, runs one optimization attempt on a sample of the training
//! rows, falls back to the original tree on any recoverable failure, and
//! reports a quality that is comparable across individuals.
//!
//! ## Design notes
//!
//! * **Shared, immutable**: `evaluate(&self, ...)` touches no shared mutable
//!   state except the optional counters, which sit behind a mutex. One
//!   evaluator may serve many threads.
//! * **Caller's randomness**: The optimization coin flip and row sampling
//!   draw from the caller's RNG, so a seeded RNG makes evaluation
//!   reproducible.
//! * **Fallback**: Every error except cancellation keeps the original tree.
//!
//! ## Key concepts
//!
//! * **Revert-if-worse**: A fit whose quality is below the original tree's
//!   quality (by more than `QUALITY_TOLERANCE`) on the same rows is discarded.
//! * **Reconciliation**: When optimization and evaluation use different row
//!   percentages, the reported quality is recomputed on the evaluation rows.
//!
//! ## Invariants
//!
//! * The input tree is never mutated.
//! * A reported quality is always in `[0, 1]`.

use std::collections::HashSet;

use rand::Rng;

use crate::algorithms::writeback::LinearScaling;
use crate::engine::pipeline::{optimize_constants, OptimizationSettings};
use crate::engine::validator::Validator;
use crate::evaluation::quality::{evaluate_quality, EstimationLimits};
use crate::evaluation::sampling::sample_rows;
use crate::primitives::cancel::CancellationToken;
use crate::primitives::counters::{EvaluationCounters, FitCounters};
use crate::primitives::errors::FitError;
use crate::tree::dataset::{Dataset, VariableType};
use crate::tree::node::{NodeId, SymbolicExpressionTree};

/// Largest quality loss accepted from a fit before reverting to the original tree.
pub const QUALITY_TOLERANCE: f64 = 1e-3;

// ============================================================================
// Configuration and result
// ============================================================================

/// Validated evaluator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    /// Probability of optimizing a given tree.
    pub probability: f64,
    /// Solver iteration budget.
    pub iterations: usize,
    /// Fraction of training rows used for fitting.
    pub optimization_rows_percentage: f64,
    /// Fraction of training rows used for the reported quality.
    pub evaluation_rows_percentage: f64,
    /// Optimize variable and factor weights.
    pub update_variable_weights: bool,
    /// Fit `α·f(x) + β` around the tree.
    pub linear_scaling: bool,
    /// Return the tree with optimized values.
    pub update_constants_in_tree: bool,
    /// Prediction clamp used for quality.
    pub estimation_limits: EstimationLimits,
    /// Run the finite-difference gradient check.
    pub gradient_check: bool,
    /// Accumulate evaluation counters.
    pub count_evaluations: bool,
    /// Training rows; `None` means every dataset row.
    pub training_rows: Option<Vec<usize>>,
    /// Target variable.
    pub target: String,
    /// Nodes whose values stay fixed.
    pub excluded_nodes: HashSet<NodeId>,
}

/// Output of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// Tree to keep in the population.
    pub tree: SymbolicExpressionTree,
    /// Squared Pearson correlation on the evaluation rows.
    pub quality: f64,
    /// Whether an optimization result was accepted.
    pub optimized: bool,
    /// Normalized solver evaluation counts of this call.
    pub counters: FitCounters,
    /// Scaling terms of the accepted fit.
    pub scaling: Option<LinearScaling>,
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluator that optimizes tree constants before scoring.
#[derive(Debug)]
pub struct ConstantOptimizationEvaluator {
    config: EvaluatorConfig,
    counters: Option<EvaluationCounters>,
}

impl ConstantOptimizationEvaluator {
    /// Create an evaluator from a validated configuration.
    pub fn new(config: EvaluatorConfig) -> Self {
        let counters = config.count_evaluations.then(EvaluationCounters::new);
        Self { config, counters }
    }

    /// Configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Counters accumulated over all calls, if counting is enabled.
    pub fn counters(&self) -> Option<FitCounters> {
        self.counters.as_ref().map(EvaluationCounters::snapshot)
    }

    /// Reset accumulated counters, returning their previous value.
    pub fn reset_counters(&self) -> Option<FitCounters> {
        self.counters.as_ref().map(EvaluationCounters::reset)
    }

    /// Evaluate `tree`, optimizing its constants with probability `probability`.
    ///
    /// Returns `Err` for cancellation and for errors that concern the data
    /// rather than the tree (unknown target, rows outside the dataset).
    pub fn evaluate<D, R>(
        &self,
        tree: &SymbolicExpressionTree,
        dataset: &D,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<EvaluationResult, FitError>
    where
        D: Dataset + ?Sized,
        R: Rng + ?Sized,
    {
        let config = &self.config;
        let all_rows: Vec<usize>;
        let training: &[usize] = match &config.training_rows {
            Some(rows) => rows,
            None => {
                all_rows = (0..dataset.row_count()).collect();
                &all_rows
            }
        };
        Validator::validate_rows(training, dataset.row_count())?;
        match dataset.variable_type(&config.target) {
            Some(VariableType::Double) => {}
            Some(_) => {
                return Err(FitError::VariableTypeMismatch {
                    variable: config.target.clone(),
                    expected: VariableType::Double.name(),
                })
            }
            None => return Err(FitError::UnknownVariable(config.target.clone())),
        }

        let mut result = EvaluationResult {
            tree: tree.clone(),
            quality: 0.0,
            optimized: false,
            counters: FitCounters::default(),
            scaling: None,
        };

        let draw: f64 = rng.random();
        let mut attempted = false;

        if draw < config.probability {
            let rows = sample_rows(training, config.optimization_rows_percentage, rng)?;
            let settings = OptimizationSettings {
                max_iterations: config.iterations,
                update_variable_weights: config.update_variable_weights,
                linear_scaling: config.linear_scaling,
                gradient_check: config.gradient_check,
                excluded_nodes: config.excluded_nodes.clone(),
            };

            let original_quality = self.score(tree, dataset, &rows)?;
            result.quality = original_quality;

            match optimize_constants(tree, dataset, &config.target, &rows, &settings, cancel) {
                Ok(fitted) => {
                    result.counters = fitted.counters;
                    let quality = self.score(&fitted.tree, dataset, &rows)?;
                    if original_quality - quality > QUALITY_TOLERANCE {
                        log::debug!(
                            "fit rejected: quality {:.6} below original {:.6}",
                            quality,
                            original_quality
                        );
                    } else {
                        result.quality = quality;
                        result.optimized = true;
                        result.scaling = fitted.scaling;
                        if config.update_constants_in_tree {
                            result.tree = fitted.tree;
                        }
                    }
                }
                Err(FitError::Cancelled) => return Err(FitError::Cancelled),
                Err(e) => {
                    log::debug!("keeping original tree: {}", e);
                }
            }
            attempted = true;
        }

        let reconcile = config.optimization_rows_percentage != config.evaluation_rows_percentage;
        if !attempted || reconcile {
            let rows = sample_rows(training, config.evaluation_rows_percentage, rng)?;
            result.quality = self.score(&result.tree, dataset, &rows)?;
        }

        if let Some(counters) = &self.counters {
            counters.accumulate(result.counters);
        }

        Ok(result)
    }

    /// Quality of a tree; trees that cannot be evaluated score `0`.
    fn score<D: Dataset + ?Sized>(
        &self,
        tree: &SymbolicExpressionTree,
        dataset: &D,
        rows: &[usize],
    ) -> Result<f64, FitError> {
        let config = &self.config;
        match evaluate_quality(tree, dataset, &config.target, rows, &config.estimation_limits) {
            Ok(quality) => Ok(quality),
            Err(FitError::Cancelled) => Err(FitError::Cancelled),
            Err(e) => {
                log::debug!("tree cannot be evaluated, scoring 0: {}", e);
                Ok(0.0)
            }
        }
    }
}
