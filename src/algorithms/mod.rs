//! Layer 4: Algorithms
//!
//! # Purpose
//!
//! This layer turns a tree into a fittable model and back:
//! - Differentiable term graphs with reverse-mode gradients
//! - The term graph builder (parameter and input discovery)
//! - Data binding into a dense design matrix
//! - Write-back of optimized parameters
//! - The Levenberg–Marquardt solver
//!
//! # Architecture
//!
//! ```text
//! Layer 7: Gate / API
//!   ↓
//! Layer 6: Engine
//!   ↓
//! Layer 5: Evaluation
//!   ↓
//! Layer 4: Algorithms ← You are here
//!   ↓
//! Layer 3: Tree
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Data binding (`X`, `y`).
pub mod binder;

/// Tree to term graph translation.
pub mod builder;

/// Levenberg–Marquardt solver.
pub mod lm;

/// Differentiable term graph.
pub mod term;

/// Parameter write-back.
pub mod writeback;
