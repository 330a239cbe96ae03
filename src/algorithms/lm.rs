//! Levenberg–Marquardt nonlinear least squares.
//!
//! ## Purpose
//!
//! This module minimizes `½‖r(c)‖²` over a parameter vector `c` for any
//! [`LeastSquaresProblem`] that supplies residuals and their Jacobian.
//!
//! ## Design notes
//!
//! * **Marquardt damping**: Each step solves `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr`.
//!   Accepted steps shrink `λ`, rejected steps grow it.
//! * **Budget stopping**: A tolerance of `0` disables the convergence tests,
//!   so the solver runs until the iteration budget is spent or no step
//!   improves the cost.
//! * **Fallible callbacks**: Problems return `Result`, so a callback can
//!   abort the solve (cancellation, data errors).
//!
//! ## Key concepts
//!
//! * **Iteration**: One Jacobian evaluation followed by up to
//!   `MAX_DAMPING_STEPS` trial steps.
//! * **Gradient check**: Optional comparison of the analytic Jacobian with
//!   central finite differences at the starting point.
//!
//! ## Invariants
//!
//! * With a zero iteration budget the returned parameters equal the initial
//!   parameters bit for bit and no callback is invoked.
//! * The returned cost never exceeds the initial cost.
//!
//! ## Non-goals
//!
//! * Bound constraints on parameters.
//! * Sparse Jacobians.

use nalgebra::DMatrix;

use crate::math::linalg::{normal_equations, solve_damped};
use crate::primitives::buffer::SolverBuffer;
use crate::primitives::errors::FitError;

// ============================================================================
// Problem Interface
// ============================================================================

/// A nonlinear least-squares problem.
pub trait LeastSquaresProblem {
    /// Number of residuals.
    fn residual_count(&self) -> usize;

    /// Number of parameters.
    fn parameter_count(&self) -> usize;

    /// Write `r(params)` into `out`.
    fn residuals(&mut self, params: &[f64], out: &mut [f64]) -> Result<(), FitError>;

    /// Write the Jacobian `∂r/∂params` (residuals × parameters) into `out`.
    fn jacobian(&mut self, params: &[f64], out: &mut DMatrix<f64>) -> Result<(), FitError>;
}

// ============================================================================
// Report
// ============================================================================

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// A convergence tolerance was met.
    Converged,
    /// The iteration budget was spent.
    MaxIterations,
    /// No damped step reduced the cost.
    Stalled,
    /// The analytic Jacobian disagrees with finite differences.
    BadGradient,
    /// The starting residuals or a Jacobian contained NaN or infinity.
    ///
    /// Non-finite residuals at a trial point only reject that step; the
    /// solve continues with more damping.
    NonFinite,
}

impl SolverStatus {
    /// Whether the status denotes a numerical failure.
    pub fn is_failure(self) -> bool {
        matches!(self, SolverStatus::BadGradient | SolverStatus::NonFinite)
    }
}

/// Result of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverReport {
    /// Final parameters.
    pub params: Vec<f64>,
    /// Stop reason.
    pub status: SolverStatus,
    /// Completed iterations.
    pub iterations: usize,
    /// Final cost `½‖r‖²` (NaN if never evaluated).
    pub cost: f64,
    /// Residual callbacks made.
    pub residual_evaluations: usize,
    /// Jacobian callbacks made.
    pub jacobian_evaluations: usize,
}

// ============================================================================
// Solver
// ============================================================================

/// Maximum trial steps per iteration before the solve counts as stalled.
const MAX_DAMPING_STEPS: usize = 10;

/// Relative agreement required by the gradient check.
const GRADIENT_CHECK_TOLERANCE: f64 = 1e-3;

/// Levenberg–Marquardt solver configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    /// Iteration budget.
    pub max_iterations: usize,
    /// Relative cost reduction and gradient tolerance; `0` disables both.
    pub tolerance: f64,
    /// Initial damping factor.
    pub initial_lambda: f64,
    /// Compare the Jacobian against finite differences before iterating.
    pub gradient_check: bool,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 0.0,
            initial_lambda: 1e-3,
            gradient_check: false,
        }
    }
}

impl LevenbergMarquardt {
    /// Create a solver with the given budget and default settings.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    /// Minimize the problem starting from `initial`.
    pub fn solve<P: LeastSquaresProblem + ?Sized>(
        &self,
        problem: &mut P,
        initial: &[f64],
    ) -> Result<SolverReport, FitError> {
        let m = problem.residual_count();
        let n = problem.parameter_count();
        if initial.len() != n {
            return Err(FitError::ParameterCountMismatch {
                expected: n,
                got: initial.len(),
            });
        }

        let mut report = SolverReport {
            params: initial.to_vec(),
            status: SolverStatus::MaxIterations,
            iterations: 0,
            cost: f64::NAN,
            residual_evaluations: 0,
            jacobian_evaluations: 0,
        };
        if self.max_iterations == 0 || n == 0 {
            return Ok(report);
        }

        let mut buffer = SolverBuffer::new(m, n);
        buffer.residuals.reset(m, 0.0);
        buffer.trial_residuals.reset(m, 0.0);

        problem.residuals(&report.params, &mut buffer.residuals)?;
        report.residual_evaluations += 1;
        if !all_finite(&buffer.residuals) {
            report.status = SolverStatus::NonFinite;
            return Ok(report);
        }
        let mut cost = half_squared_norm(&buffer.residuals);
        report.cost = cost;

        let mut jacobian = DMatrix::<f64>::zeros(m, n);

        if self.gradient_check {
            problem.jacobian(&report.params, &mut jacobian)?;
            report.jacobian_evaluations += 1;
            if !jacobian.iter().all(|v| v.is_finite()) {
                report.status = SolverStatus::NonFinite;
                return Ok(report);
            }
            let (bad_column, evaluations) =
                check_gradient(problem, &report.params, &jacobian, &mut buffer)?;
            report.residual_evaluations += evaluations;
            if let Some(column) = bad_column {
                log::warn!("gradient check failed for parameter {}", column);
                report.status = SolverStatus::BadGradient;
                return Ok(report);
            }
        }

        let mut lambda = self.initial_lambda;
        for iteration in 0..self.max_iterations {
            problem.jacobian(&report.params, &mut jacobian)?;
            report.jacobian_evaluations += 1;
            if !jacobian.iter().all(|v| v.is_finite()) {
                report.status = SolverStatus::NonFinite;
                return Ok(report);
            }

            let (jtj, jtr) = normal_equations(&jacobian, &buffer.residuals);
            if self.tolerance > 0.0 && jtr.amax() <= self.tolerance {
                report.status = SolverStatus::Converged;
                break;
            }

            let mut accepted = false;
            for _ in 0..MAX_DAMPING_STEPS {
                let Some(delta) = solve_damped(&jtj, &jtr, lambda) else {
                    lambda *= 10.0;
                    continue;
                };

                buffer.trial_params.clear();
                buffer
                    .trial_params
                    .extend(report.params.iter().zip(delta.iter()).map(|(c, d)| c + d));

                problem.residuals(&buffer.trial_params, &mut buffer.trial_residuals)?;
                report.residual_evaluations += 1;

                let trial_cost = if all_finite(&buffer.trial_residuals) {
                    half_squared_norm(&buffer.trial_residuals)
                } else {
                    f64::INFINITY
                };

                if trial_cost < cost {
                    let reduction = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
                    report.params.copy_from_slice(&buffer.trial_params);
                    core::mem::swap(&mut buffer.residuals, &mut buffer.trial_residuals);
                    cost = trial_cost;
                    lambda = (lambda * 0.1).max(1e-12);
                    accepted = true;
                    log::trace!(
                        "lm iteration {}: cost {:.6e}, lambda {:.1e}",
                        iteration,
                        cost,
                        lambda
                    );
                    if self.tolerance > 0.0 && reduction <= self.tolerance {
                        report.status = SolverStatus::Converged;
                    }
                    break;
                }
                lambda *= 10.0;
            }

            report.iterations = iteration + 1;
            report.cost = cost;

            if !accepted {
                report.status = SolverStatus::Stalled;
                break;
            }
            if report.status == SolverStatus::Converged {
                break;
            }
        }

        Ok(report)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn half_squared_norm(values: &[f64]) -> f64 {
    0.5 * values.iter().map(|v| v * v).sum::<f64>()
}

/// Compare each Jacobian column with a central finite difference.
///
/// Returns the first disagreeing column and the number of residual
/// evaluations spent.
fn check_gradient<P: LeastSquaresProblem + ?Sized>(
    problem: &mut P,
    params: &[f64],
    jacobian: &DMatrix<f64>,
    buffer: &mut SolverBuffer,
) -> Result<(Option<usize>, usize), FitError> {
    let m = jacobian.nrows();
    let mut forward = vec![0.0; m];
    let mut evaluations = 0;

    for j in 0..params.len() {
        let h = 1e-6 * params[j].abs().max(1.0);

        buffer.trial_params.clear();
        buffer.trial_params.extend_from_slice(params);
        buffer.trial_params[j] = params[j] + h;
        problem.residuals(&buffer.trial_params, &mut forward)?;
        buffer.trial_params[j] = params[j] - h;
        problem.residuals(&buffer.trial_params, &mut buffer.trial_residuals)?;
        evaluations += 2;

        for i in 0..m {
            let numeric = (forward[i] - buffer.trial_residuals[i]) / (2.0 * h);
            if !numeric.is_finite() {
                continue;
            }
            let analytic = jacobian[(i, j)];
            if (analytic - numeric).abs() > GRADIENT_CHECK_TOLERANCE * numeric.abs().max(1.0) {
                return Ok((Some(j), evaluations));
            }
        }
    }

    Ok((None, evaluations))
}
