//! Error types for parameter optimization.
//!
//! ## Purpose
//!
//! This module defines [`FitError`], the single error type returned by every
//! fallible operation in the crate: building the differentiable graph,
//! binding data, running the solver, writing parameters back, and validating
//! configuration.
//!
//! ## Design notes
//!
//! * **Plain enum**: Hand-written `Display`, no derive macros.
//! * **Comparable**: `Clone` and `PartialEq` so tests can assert on exact errors.
//! * **Classified**: [`FitError::is_fallback`] tells the optimization gate which
//!   errors mean "keep the original tree" and which must reach the caller.
//!
//! ## Key concepts
//!
//! * **Build-time errors**: `UnsupportedSymbol`, `BroadcastMismatch`,
//!   `InconsistentVectorLength`. Non-retryable for the tree at hand.
//! * **Runtime errors**: `NumericalFailure` from the solver, `Cancelled` from the
//!   caller's cancellation token.
//! * **No-op outcome**: `DegenerateModel` signals a tree without tunable
//!   parameters.
//!
//! ## Invariants
//!
//! * No error variant carries a partially fitted parameter vector.
//!
//! ## Non-goals
//!
//! * This module does not decide recovery policy (handled by the gate).

use core::fmt;

use crate::tree::NodeId;

/// Error type for tree parameter optimization.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// A node's symbol has no differentiable primitive.
    UnsupportedSymbol {
        /// Prefix position of the offending node.
        node: NodeId,
        /// Human readable symbol name.
        symbol: String,
    },

    /// Two vector operands could not be broadcast against each other.
    BroadcastMismatch {
        /// Prefix position of the combining node.
        node: NodeId,
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },

    /// A vector-valued subtree did not have the same length on every row.
    InconsistentVectorLength {
        /// Prefix position of the node.
        node: NodeId,
    },

    /// The tree has no tunable parameters.
    DegenerateModel,

    /// The solver reported a numerical failure (bad gradient, NaN/Inf).
    NumericalFailure(String),

    /// The fit was cancelled by the caller.
    Cancelled,

    /// The dataset has no variable with this name.
    UnknownVariable(String),

    /// The dataset variable does not have the type the tree requires.
    VariableTypeMismatch {
        /// Variable name.
        variable: String,
        /// Expected storage type.
        expected: &'static str,
    },

    /// A (possibly lagged) row index fell outside the dataset.
    RowOutOfRange {
        /// Requested row (after applying lag).
        row: i64,
        /// Number of rows in the dataset.
        rows: usize,
    },

    /// A column was added with a different row count than the dataset.
    ColumnLengthMismatch {
        /// Column name.
        variable: String,
        /// Row count of the dataset.
        expected: usize,
        /// Row count of the new column.
        got: usize,
    },

    /// A vector element index exceeded the vector's length.
    IndexOutOfRange {
        /// Variable name.
        variable: String,
        /// Requested element.
        index: usize,
        /// Vector length.
        len: usize,
    },

    /// A parameter vector does not match the slots of a tree or model.
    ParameterCountMismatch {
        /// Number of parameters the tree or model requires.
        expected: usize,
        /// Number of parameters supplied.
        got: usize,
    },

    /// No rows were selected for fitting or evaluation.
    EmptyRows,

    /// Optimization probability outside `[0, 1]`.
    InvalidProbability(f64),

    /// Row percentage outside `(0, 1]`.
    InvalidPercentage {
        /// Parameter name.
        parameter: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Iteration budget above the supported maximum.
    InvalidIterations(usize),

    /// Estimation limits are not an ordered pair of non-NaN values.
    InvalidEstimationLimits {
        /// Lower limit.
        lower: f64,
        /// Upper limit.
        upper: f64,
    },

    /// Builder parameter was set more than once.
    DuplicateParameter {
        /// Parameter name.
        parameter: &'static str,
    },

    /// A required builder parameter was never set.
    MissingParameter {
        /// Parameter name.
        parameter: &'static str,
    },
}

impl FitError {
    /// Whether the optimization gate should absorb this error and keep the
    /// original tree.
    ///
    /// `Cancelled` is the only error that must propagate; configuration errors
    /// never reach the gate at evaluation time.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, FitError::Cancelled)
    }
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::UnsupportedSymbol { node, symbol } => {
                write!(f, "Unsupported symbol '{}' at node {}", symbol, node.0)
            }
            FitError::BroadcastMismatch { node, left, right } => write!(
                f,
                "Cannot broadcast operands of length {} and {} at node {}",
                left, right, node.0
            ),
            FitError::InconsistentVectorLength { node } => {
                write!(f, "Vector length differs between rows at node {}", node.0)
            }
            FitError::DegenerateModel => write!(f, "Model has no tunable parameters"),
            FitError::NumericalFailure(reason) => write!(f, "Numerical failure: {}", reason),
            FitError::Cancelled => write!(f, "Optimization was cancelled"),
            FitError::UnknownVariable(name) => write!(f, "Unknown variable: {}", name),
            FitError::VariableTypeMismatch { variable, expected } => {
                write!(f, "Variable '{}' is not of type {}", variable, expected)
            }
            FitError::RowOutOfRange { row, rows } => {
                write!(f, "Row {} is out of range for dataset with {} rows", row, rows)
            }
            FitError::ColumnLengthMismatch {
                variable,
                expected,
                got,
            } => write!(
                f,
                "Column '{}' has {} rows, dataset has {}",
                variable, got, expected
            ),
            FitError::IndexOutOfRange {
                variable,
                index,
                len,
            } => write!(
                f,
                "Index {} is out of range for variable '{}' of length {}",
                index, variable, len
            ),
            FitError::ParameterCountMismatch { expected, got } => write!(
                f,
                "Parameter count mismatch: expected {}, got {}",
                expected, got
            ),
            FitError::EmptyRows => write!(f, "No rows selected"),
            FitError::InvalidProbability(p) => {
                write!(f, "Invalid probability: {} (must be in [0, 1])", p)
            }
            FitError::InvalidPercentage { parameter, value } => {
                write!(f, "Invalid {}: {} (must be > 0 and <= 1)", parameter, value)
            }
            FitError::InvalidIterations(n) => {
                write!(f, "Invalid iterations: {} (must be in [0, 10000])", n)
            }
            FitError::InvalidEstimationLimits { lower, upper } => write!(
                f,
                "Invalid estimation limits: [{}, {}] (lower must not exceed upper)",
                lower, upper
            ),
            FitError::DuplicateParameter { parameter } => write!(
                f,
                "Parameter '{}' was set multiple times. Each parameter can only be configured once.",
                parameter
            ),
            FitError::MissingParameter { parameter } => {
                write!(f, "Required parameter '{}' was not set", parameter)
            }
        }
    }
}

impl std::error::Error for FitError {}
