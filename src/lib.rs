//! # treefit: constant optimization for symbolic regression trees
//!
//! Parameter estimation for tree-structured symbolic models. Given a candidate
//! expression tree produced by a genetic-programming search and a dataset,
//! `treefit` finds values for every continuous quantity in the tree (numeric
//! constants, variable weights, per-category factor weights and an optional
//! affine rescaling `α·f(x) + β`) that minimize the squared prediction error
//! against an observed target.
//!
//! ## How it works
//!
//! 1. The tree is translated into a differentiable term graph. Every tunable
//!    leaf becomes a parameter, every data column an input.
//! 2. The selected rows are bound into a design matrix `X` and target `y`.
//! 3. A Levenberg–Marquardt solver minimizes `Σ (f(c, X[i,:]) − y[i])²` using
//!    reverse-mode gradients of the graph.
//! 4. The optimized parameters are written back into a clone of the tree.
//!
//! Any failure (unsupported symbols, numerical breakdown, shape mismatches)
//! falls back to the original tree; only cancellation reaches the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use treefit::prelude::*;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! // y = 2x + 1
//! let data = InMemoryDataset::new()
//!     .with_doubles("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])?
//!     .with_doubles("y", vec![3.0, 5.0, 7.0, 9.0, 11.0])?;
//!
//! // c0 * x + c1
//! let tree = SymbolicExpressionTree::with_program_root(TreeNode::op(
//!     Symbol::Add,
//!     vec![
//!         TreeNode::op(Symbol::Mul, vec![TreeNode::constant(0.5), TreeNode::variable("x", 1.0)]),
//!         TreeNode::constant(0.0),
//!     ],
//! ));
//!
//! let evaluator = TreeFit::new()
//!     .target("y")
//!     .iterations(20)
//!     .linear_scaling(false)
//!     .build()?;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let result = evaluator.evaluate(&tree, &data, &mut rng, &CancellationToken::new())?;
//!
//! assert!(result.optimized);
//! assert!(result.quality > 0.999);
//! # Result::<(), FitError>::Ok(())
//! ```
//!
//! ## Parameters
//!
//! | Parameter                        | Default                  | Range/Options | Description                                  |
//! |----------------------------------|--------------------------|---------------|----------------------------------------------|
//! | **target**                       | (required)               | variable name | Observed variable                            |
//! | **probability**                  | 1.0                      | [0, 1]        | Chance that a tree is optimized              |
//! | **iterations**                   | 10                       | [0, 10000]    | Solver iteration budget                      |
//! | **optimization_rows_percentage** | 1.0                      | (0, 1]        | Fraction of training rows used for fitting   |
//! | **evaluation_rows_percentage**   | 1.0                      | (0, 1]        | Fraction of training rows used for quality   |
//! | **update_variable_weights**      | true                     | true/false    | Tune variable and factor weights             |
//! | **linear_scaling**               | true                     | true/false    | Fit `α·f(x) + β` around the tree             |
//! | **update_constants_in_tree**     | true                     | true/false    | Return the optimized tree                    |
//! | **estimation_limits**            | `[f64::MIN, f64::MAX]`   | lower ≤ upper | Clamp predictions before scoring             |
//! | **gradient_check**               | false                    | true/false    | Finite-difference check of the gradient      |
//! | **count_evaluations**            | false                    | true/false    | Accumulate solver evaluation counters        |
//! | **training_rows**                | all rows                 | row indices   | Rows available for fitting and scoring       |
//! | **excluded_nodes**               | none                     | node ids      | Leaves whose values stay fixed               |
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger. Build and fit outcomes are logged at `debug`, solver
//! iterations at `trace`, numerical failures at `warn`.

#![deny(missing_docs)]

// ============================================================================
// Internal Modules
// ============================================================================

// Layer 1: Primitives - errors, buffers, cancellation and counters.
mod primitives;

// Layer 2: Math - special functions, damped linear solves, correlation.
mod math;

// Layer 3: Tree - symbols, trees, datasets and the interpreter.
mod tree;

// Layer 4: Algorithms - term graphs, graph builder, binder, write-back, solver.
mod algorithms;

// Layer 5: Evaluation - fit quality and row sampling.
mod evaluation;

// Layer 6: Engine - validation, fitting driver and optimization pipeline.
mod engine;

// Layer 7: Gate - the evaluator that decides, fits, and reconciles quality.
mod gate;

// High-level fluent API.
mod api;

// ============================================================================
// Prelude
// ============================================================================

/// Standard treefit prelude.
///
/// This module is intended to be wildcard-imported for convenient access
/// to the most commonly used types:
///
/// ```
/// use treefit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{
        CancellationToken, ConstantOptimizationEvaluator, Dataset, EstimationLimits,
        EvaluationResult, FitCounters, FitError, InMemoryDataset, LinearScaling, NodeId, Symbol,
        SymbolicExpressionTree, TreeFitBuilder as TreeFit, TreeNode,
    };
}

// ============================================================================
// Testing re-exports
// ============================================================================

/// Internal modules for development and testing.
///
/// This module re-exports internal modules for development and testing purposes.
/// It is only available with the `dev` feature enabled.
///
/// **Warning**: These are internal implementation details and may change without notice.
/// Do not use in production code.
#[cfg(feature = "dev")]
pub mod internals {
    /// Internal primitive types and utilities.
    pub mod primitives {
        pub use crate::primitives::*;
    }
    /// Internal math functions.
    pub mod math {
        pub use crate::math::*;
    }
    /// Internal tree types.
    pub mod tree {
        pub use crate::tree::*;
    }
    /// Internal core algorithms.
    pub mod algorithms {
        pub use crate::algorithms::*;
    }
    /// Internal evaluation.
    pub mod evaluation {
        pub use crate::evaluation::*;
    }
    /// Internal execution engine.
    pub mod engine {
        pub use crate::engine::*;
    }
    /// Internal optimization gate.
    pub mod gate {
        pub use crate::gate::*;
    }
    /// Internal API.
    pub mod api {
        pub use crate::api::*;
    }
}
