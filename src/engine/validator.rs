//! Configuration validation for constant optimization.
//!
//! ## Purpose
//!
//! This module checks the parameters of the optimization gate before any
//! tree is evaluated: probabilities, row percentages, iteration budgets,
//! estimation limits and builder duplicates.
//!
//! ## Design notes
//!
//! * **Fail-Fast**: Validation stops at the first error encountered.
//! * **Static**: All checks are associated functions without state.
//!
//! ## Key concepts
//!
//! * **Parameter Bounds**: Probability in `[0, 1]`, percentages in `(0, 1]`,
//!   iterations in `[0, 10000]`.
//!
//! ## Invariants
//!
//! * Validation logic is deterministic and side-effect free.
//!
//! ## Non-goals
//!
//! * This module does not check datasets or trees (handled at evaluation time).
//! * This module does not provide automatic correction of invalid inputs.

use crate::primitives::errors::FitError;

// ============================================================================
// Validator
// ============================================================================

/// Validation utility for optimization configuration.
///
/// All methods return `Result<(), FitError>` and fail fast upon identifying
/// the first violation.
pub struct Validator;

impl Validator {
    /// Maximum solver iteration budget.
    pub const MAX_ITERATIONS: usize = 10_000;

    /// Validate the probability of optimizing a tree.
    pub fn validate_probability(probability: f64) -> Result<(), FitError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(FitError::InvalidProbability(probability));
        }
        Ok(())
    }

    /// Validate a row percentage.
    pub fn validate_percentage(parameter: &'static str, value: f64) -> Result<(), FitError> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(FitError::InvalidPercentage { parameter, value });
        }
        Ok(())
    }

    /// Validate the solver iteration budget.
    ///
    /// # Notes
    ///
    /// * 0 iterations leaves every parameter at its initial value.
    pub fn validate_iterations(iterations: usize) -> Result<(), FitError> {
        if iterations > Self::MAX_ITERATIONS {
            return Err(FitError::InvalidIterations(iterations));
        }
        Ok(())
    }

    /// Validate estimation limits.
    pub fn validate_estimation_limits(lower: f64, upper: f64) -> Result<(), FitError> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(FitError::InvalidEstimationLimits { lower, upper });
        }
        Ok(())
    }

    /// Validate that a row selection is non-empty and inside the dataset.
    pub fn validate_rows(rows: &[usize], row_count: usize) -> Result<(), FitError> {
        if rows.is_empty() {
            return Err(FitError::EmptyRows);
        }
        if let Some(&row) = rows.iter().find(|&&r| r >= row_count) {
            return Err(FitError::RowOutOfRange {
                row: row as i64,
                rows: row_count,
            });
        }
        Ok(())
    }

    /// Validate that no parameters were set multiple times in the builder.
    pub fn validate_no_duplicates(duplicate_param: Option<&'static str>) -> Result<(), FitError> {
        if let Some(param) = duplicate_param {
            return Err(FitError::DuplicateParameter { parameter: param });
        }
        Ok(())
    }
}
