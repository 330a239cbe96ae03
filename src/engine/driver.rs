//! Fitting driver.
//!
//! ## Purpose
//!
//! This module fits a [`DifferentiableModel`] to bound data by running the
//! Levenberg–Marquardt solver on the per-row residuals
//! `model(c, X[i,:]) − y[i]`.
//!
//! ## Design notes
//!
//! * **Problem adapter**: [`FittingDriver::fit`] wraps the model, data and
//!   cancellation token in a [`LeastSquaresProblem`]; every solver callback
//!   is one sweep over all rows.
//! * **Cancellation**: The token is polled at the start of every callback,
//!   so a cancelled fit stops within one sweep.
//! * **Counting**: Per-row evaluations are counted and normalized by the row
//!   count, giving the number of sweeps.
//!
//! ## Key concepts
//!
//! * **Success**: Optimized parameters plus counters.
//! * **Numerical failure**: A bad gradient or non-finite residual/Jacobian.
//!   No partial parameter vector is returned.
//!
//! ## Invariants
//!
//! * With `max_iterations = 0` the returned parameters equal `initial`.
//!
//! ## Non-goals
//!
//! * Data binding or tree handling (see the algorithms layer).

use nalgebra::DMatrix;

use crate::algorithms::binder::RowMatrix;
use crate::algorithms::lm::{LeastSquaresProblem, LevenbergMarquardt};
use crate::algorithms::term::DifferentiableModel;
use crate::primitives::cancel::CancellationToken;
use crate::primitives::counters::FitCounters;
use crate::primitives::errors::FitError;

// ============================================================================
// Outcome
// ============================================================================

/// Result of a fit that was not cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    /// The solver finished without numerical problems.
    Success {
        /// Optimized parameters.
        params: Vec<f64>,
        /// Normalized evaluation counts.
        counters: FitCounters,
    },
    /// The solver reported a numerical failure.
    NumericalFailure {
        /// Human readable reason.
        reason: String,
    },
}

// ============================================================================
// Driver
// ============================================================================

/// Runs the solver for a model over bound data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FittingDriver {
    gradient_check: bool,
}

impl FittingDriver {
    /// Create a driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the finite-difference gradient check before the first step.
    pub fn with_gradient_check(mut self, enabled: bool) -> Self {
        self.gradient_check = enabled;
        self
    }

    /// Fit `model` to `(x, y)` starting from `initial`.
    ///
    /// Returns `Err(FitError::Cancelled)` if `cancel` fires during the fit.
    pub fn fit<M: DifferentiableModel + ?Sized>(
        &self,
        model: &mut M,
        x: &RowMatrix,
        y: &[f64],
        initial: &[f64],
        max_iterations: usize,
        cancel: &CancellationToken,
    ) -> Result<FitOutcome, FitError> {
        let n = model.parameter_count();
        if n == 0 {
            return Err(FitError::DegenerateModel);
        }
        if initial.len() != n {
            return Err(FitError::ParameterCountMismatch {
                expected: n,
                got: initial.len(),
            });
        }
        if y.is_empty() {
            return Err(FitError::EmptyRows);
        }
        if x.rows() != y.len() {
            return Err(FitError::ColumnLengthMismatch {
                variable: "target".to_string(),
                expected: x.rows(),
                got: y.len(),
            });
        }
        if cancel.is_cancelled() {
            return Err(FitError::Cancelled);
        }

        let mut problem = RowProblem {
            model,
            x,
            y,
            cancel,
            gradient: vec![0.0; n],
            raw_function: 0,
            raw_gradient: 0,
        };

        let solver = LevenbergMarquardt {
            gradient_check: self.gradient_check,
            ..LevenbergMarquardt::new(max_iterations)
        };
        let report = solver.solve(&mut problem, initial)?;

        let counters = FitCounters::from_raw(problem.raw_function, problem.raw_gradient, y.len());

        if report.status.is_failure() {
            let reason = format!("{:?} after {} iterations", report.status, report.iterations);
            log::warn!("fit failed: {}", reason);
            return Ok(FitOutcome::NumericalFailure { reason });
        }

        log::debug!(
            "fit finished: {:?} after {} iterations, cost {:.6e}",
            report.status,
            report.iterations,
            report.cost
        );
        Ok(FitOutcome::Success {
            params: report.params,
            counters,
        })
    }
}

// ============================================================================
// Least-squares adapter
// ============================================================================

struct RowProblem<'a, M: ?Sized> {
    model: &'a mut M,
    x: &'a RowMatrix,
    y: &'a [f64],
    cancel: &'a CancellationToken,
    gradient: Vec<f64>,
    raw_function: usize,
    raw_gradient: usize,
}

impl<M: DifferentiableModel + ?Sized> LeastSquaresProblem for RowProblem<'_, M> {
    fn residual_count(&self) -> usize {
        self.y.len()
    }

    fn parameter_count(&self) -> usize {
        self.gradient.len()
    }

    fn residuals(&mut self, params: &[f64], out: &mut [f64]) -> Result<(), FitError> {
        if self.cancel.is_cancelled() {
            return Err(FitError::Cancelled);
        }
        for (i, r) in out.iter_mut().enumerate() {
            *r = self.model.value(params, self.x.row(i)) - self.y[i];
        }
        self.raw_function += self.y.len();
        Ok(())
    }

    fn jacobian(&mut self, params: &[f64], out: &mut DMatrix<f64>) -> Result<(), FitError> {
        if self.cancel.is_cancelled() {
            return Err(FitError::Cancelled);
        }
        for i in 0..self.y.len() {
            self.model
                .value_and_gradient(params, self.x.row(i), &mut self.gradient);
            for (j, g) in self.gradient.iter().enumerate() {
                out[(i, j)] = *g;
            }
        }
        self.raw_gradient += self.y.len();
        Ok(())
    }
}
