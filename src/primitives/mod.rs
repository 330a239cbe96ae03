//! Layer 1: Primitives
//!
//! # Purpose
//!
//! This layer provides the basic data structures shared by every other layer:
//! - The crate error type
//! - Cancellation tokens
//! - Evaluation counters
//! - Reusable scratch buffers
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
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives ← You are here
//! ```

/// Reusable buffers.
pub mod buffer;

/// Cooperative cancellation.
pub mod cancel;

/// Solver evaluation counters.
pub mod counters;

/// Error types.
pub mod errors;
