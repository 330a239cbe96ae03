//! Layer 5: Evaluation
//!
//! # Purpose
//!
//! This layer scores trees and selects the rows they are scored on:
//! - Squared Pearson correlation with estimation limits
//! - Row sampling without replacement
//!
//! # Architecture
//!
//! ```text
//! Layer 7: Gate / API
//!   ↓
//! Layer 6: Engine
//!   ↓
//! Layer 5: Evaluation ← You are here
//!   ↓
//! Layer 4: Algorithms
//!   ↓
//! Layer 3: Tree
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Fit quality.
pub mod quality;

/// Row sampling.
pub mod sampling;
