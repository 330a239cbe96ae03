//! Layer 6: Engine
//!
//! # Purpose
//!
//! This layer orchestrates a fit:
//! - Configuration validation
//! - The fitting driver (solver over bound data, cancellation, counting)
//! - The single-attempt pipeline (build, bind, fit, write back)
//!
//! # Architecture
//!
//! ```text
//! Layer 7: Gate / API
//!   ↓
//! Layer 6: Engine ← You are here
//!   ↓
//! Layer 5: Evaluation
//!   ↓
//! Layer 4: Algorithms
//!   ↓
//! Layer 3: Tree
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Fitting driver.
pub mod driver;

/// Single-attempt optimization.
pub mod pipeline;

/// Configuration validation.
pub mod validator;
