//! Evaluation counters for solver diagnostics.
//!
//! ## Purpose
//!
//! This module provides [`FitCounters`], the normalized function and gradient
//! evaluation counts of a single fit, and [`EvaluationCounters`], a
//! search-wide accumulator that concurrent fits add into.
//!
//! ## Design notes
//!
//! * **Owned by the evaluator**: Each evaluator built with evaluation counting
//!   enabled creates its own accumulator; fits that share the evaluator add
//!   into it. There is no global state.
//! * **Mutex-protected**: Adding two counters is a compound update, so the
//!   totals live behind a `Mutex`.
//!
//! ## Invariants
//!
//! * Counts are normalized by the number of fitted rows before they are
//!   accumulated.

use core::ops::AddAssign;
use std::sync::{Mutex, PoisonError};

/// Normalized evaluation counts of one or more fits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitCounters {
    /// Full residual sweeps over the fitted rows.
    pub function_evaluations: usize,

    /// Full Jacobian sweeps over the fitted rows.
    pub gradient_evaluations: usize,
}

impl FitCounters {
    /// Normalize raw per-row counts by the number of rows.
    pub fn from_raw(raw_function: usize, raw_gradient: usize, rows: usize) -> Self {
        let rows = rows.max(1);
        Self {
            function_evaluations: raw_function / rows,
            gradient_evaluations: raw_gradient / rows,
        }
    }
}

impl AddAssign for FitCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.function_evaluations += rhs.function_evaluations;
        self.gradient_evaluations += rhs.gradient_evaluations;
    }
}

/// Thread-safe accumulator of [`FitCounters`].
#[derive(Debug, Default)]
pub struct EvaluationCounters {
    totals: Mutex<FitCounters>,
}

impl EvaluationCounters {
    /// Create an accumulator with zero totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the counters of one fit.
    pub fn accumulate(&self, counters: FitCounters) {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        *totals += counters;
    }

    /// Current totals.
    pub fn snapshot(&self) -> FitCounters {
        *self.totals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset totals to zero, returning the previous values.
    pub fn reset(&self) -> FitCounters {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        core::mem::take(&mut *totals)
    }
}
