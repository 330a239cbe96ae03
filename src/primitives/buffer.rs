//! Reusable scratch buffers for graph evaluation and the solver.
//!
//! ## Purpose
//!
//! The solver evaluates the differentiable graph once per row per sweep, and
//! every evaluation needs a value and an adjoint per graph node. This module
//! provides the workspaces that are allocated once per fit and recycled
//! across rows and iterations.
//!
//! ## Design notes
//!
//! * **Centralized Ownership**: `GraphBuffer` holds the per-row scratch space,
//!   `SolverBuffer` the per-sweep vectors of the Levenberg–Marquardt loop.
//! * **Reset, not reallocate**: `Slot::reset` refills in place, so capacity
//!   is kept between rows.
//!
//! ## Invariants
//!
//! * Buffers are only logically cleared between uses, never deallocated.
//!
//! ## Non-goals
//!
//! * Thread-local caching (one buffer per fit, owned by the fit).

use core::ops::{Deref, DerefMut};

// ============================================================================
// Slot - Unified Vector Abstraction
// ============================================================================

/// A reusable vector slot with automatic capacity management.
#[derive(Debug, Clone)]
pub struct Slot<T>(Vec<T>);

impl<T> Slot<T> {
    /// Create a new slot with the given initial capacity.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }
}

impl<T: Clone> Slot<T> {
    /// Clear the slot and refill it with `len` copies of `value`.
    #[inline]
    pub fn reset(&mut self, len: usize, value: T) {
        self.0.clear();
        self.0.resize(len, value);
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Deref for Slot<T> {
    type Target = Vec<T>;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for Slot<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

// ============================================================================
// Graph Buffer
// ============================================================================

/// Per-row scratch space for evaluating a term graph.
#[derive(Debug, Clone, Default)]
pub struct GraphBuffer {
    /// Forward value of every graph node.
    pub values: Slot<f64>,
    /// Reverse-mode adjoint of every graph node.
    pub adjoints: Slot<f64>,
}

impl GraphBuffer {
    /// Create a buffer sized for a graph with `nodes` nodes.
    pub fn new(nodes: usize) -> Self {
        Self {
            values: Slot::new(nodes),
            adjoints: Slot::new(nodes),
        }
    }
}

// ============================================================================
// Solver Buffer
// ============================================================================

/// Per-fit vectors for the Levenberg–Marquardt loop.
#[derive(Debug, Clone, Default)]
pub struct SolverBuffer {
    /// Residuals at the current parameters.
    pub residuals: Slot<f64>,
    /// Residuals at the trial parameters.
    pub trial_residuals: Slot<f64>,
    /// Trial parameter vector.
    pub trial_params: Slot<f64>,
}

impl SolverBuffer {
    /// Create a buffer for `rows` residuals and `params` parameters.
    pub fn new(rows: usize, params: usize) -> Self {
        Self {
            residuals: Slot::new(rows),
            trial_residuals: Slot::new(rows),
            trial_params: Slot::new(params),
        }
    }
}
