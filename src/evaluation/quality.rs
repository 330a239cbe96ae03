//! Fit quality of a tree on a set of rows.
//!
//! ## Purpose
//!
//! This module scores a tree by the squared Pearson correlation between its
//! (clamped) predictions and the observed target.
//!
//! ## Design notes
//!
//! * **Estimation limits**: Predictions are clamped to `[lower, upper]` before
//!   scoring, which bounds the influence of extreme outputs.
//! * **Never NaN**: An undefined correlation (constant predictions, NaN or
//!   infinite values) scores `0`.
//!
//! ## Invariants
//!
//! * Quality is always in `[0, 1]`.

use crate::math::correlation::pearson_r_squared;
use crate::primitives::errors::FitError;
use crate::tree::dataset::Dataset;
use crate::tree::interpreter::Interpreter;
use crate::tree::node::SymbolicExpressionTree;

/// Closed interval predictions are clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimationLimits {
    /// Lower limit.
    pub lower: f64,
    /// Upper limit.
    pub upper: f64,
}

impl EstimationLimits {
    /// Create limits.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Clamp a prediction; NaN passes through.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.lower {
            self.lower
        } else if value > self.upper {
            self.upper
        } else {
            value
        }
    }
}

impl Default for EstimationLimits {
    fn default() -> Self {
        Self::new(f64::MIN, f64::MAX)
    }
}

/// Squared Pearson correlation of clamped estimates; `0` when undefined.
pub fn r_squared(estimated: &[f64], observed: &[f64], limits: &EstimationLimits) -> f64 {
    let clamped: Vec<f64> = estimated.iter().map(|&v| limits.clamp(v)).collect();
    pearson_r_squared(&clamped, observed).unwrap_or(0.0)
}

/// Quality of `tree` on `rows` against the `target` variable.
pub fn evaluate_quality<D: Dataset + ?Sized>(
    tree: &SymbolicExpressionTree,
    dataset: &D,
    target: &str,
    rows: &[usize],
    limits: &EstimationLimits,
) -> Result<f64, FitError> {
    if rows.is_empty() {
        return Err(FitError::EmptyRows);
    }
    let estimated = Interpreter::evaluate(tree, dataset, rows)?;
    let observed = dataset.double_values(target, rows)?;
    Ok(r_squared(&estimated, &observed, limits))
}
