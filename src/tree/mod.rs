//! Layer 3: Tree
//!
//! # Purpose
//!
//! This layer provides the external collaborators the optimizer works on:
//! - The symbolic expression tree and its closed set of symbols
//! - Read-only dataset access
//! - Ordinary evaluation and evaluation traces
//!
//! A host application may supply its own [`Dataset`] implementation; the
//! tree types are the crate's minimal, owned representation of a GP
//! individual.
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
//! Layer 3: Tree ← You are here
//!   ↓
//! Layer 2: Math
//!   ↓
//! Layer 1: Primitives
//! ```

/// Dataset trait and in-memory column store.
pub mod dataset;

/// Ordinary evaluation and evaluation traces.
pub mod interpreter;

/// Tree and node storage.
pub mod node;

/// Node symbols.
pub mod symbol;

pub use dataset::{Column, Dataset, InMemoryDataset, VariableType};
pub use interpreter::{EvaluationTrace, Interpreter, Shape};
pub use node::{NodeId, SymbolicExpressionTree, TreeNode};
pub use symbol::Symbol;
