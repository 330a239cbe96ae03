//! Layer 2: Math
//!
//! # Purpose
//!
//! This layer provides pure mathematical functions used throughout the crate:
//! - Special functions with closed-form derivatives
//! - Damped normal-equation solves for the Levenberg–Marquardt step
//! - Squared Pearson correlation for fit quality
//!
//! These are reusable mathematical building blocks with no tree-specific logic.
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
//! Layer 4: Algorithms
//!   ↓
//! Layer 3: Tree
//!   ↓
//! Layer 2: Math ← You are here
//!   ↓
//! Layer 1: Primitives
//! ```

/// Squared Pearson correlation.
pub mod correlation;

/// Normal-equation solves.
pub mod linalg;

/// Special functions (erf, normal density).
pub mod special;
