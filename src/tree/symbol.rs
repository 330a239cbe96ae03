//! Node symbols of a symbolic expression tree.
//!
//! ## Purpose
//!
//! This module defines [`Symbol`], the closed set of node kinds a tree may
//! contain. Terminal symbols carry their own values (constants, variable
//! weights, factor weights); operator symbols carry nothing.
//!
//! ## Design notes
//!
//! * **Closed sum type**: Every consumer (interpreter, graph builder,
//!   write-back) matches exhaustively, so adding a symbol without handling it
//!   everywhere is a compile error.
//! * **Unsupported symbols are explicit**: Symbols with no differentiable
//!   primitive are still representable so that the builder can reject them.
//!
//! ## Key concepts
//!
//! * **Tunable terminals**: `Constant`, variable weights, factor weights.
//! * **Fixed terminals**: `FixedConstant` is a literal that is never tuned.
//! * **Exponent operators**: `Power` and `Root` take an integral exponent as
//!   their second child.

/// Kind of a tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------
    /// Tunable numeric constant.
    Constant {
        /// Current value.
        value: f64,
    },

    /// Literal that is never optimized.
    FixedConstant {
        /// Literal value.
        value: f64,
    },

    /// Reference to a numeric (or numeric vector) column, scaled by a weight.
    Variable {
        /// Column name.
        name: String,
        /// Multiplicative weight.
        weight: f64,
        /// Row offset; `-1` reads the previous row.
        lag: i32,
        /// Element index into a vector-valued column.
        index: Option<usize>,
    },

    /// Indicator of one category of a string column, scaled by a weight.
    BinaryFactorVariable {
        /// Column name.
        name: String,
        /// Category this node represents.
        category: String,
        /// Multiplicative weight.
        weight: f64,
    },

    /// One weight per category of a string column.
    FactorVariable {
        /// Column name.
        name: String,
        /// Category weights, in enumeration order.
        weights: Vec<(String, f64)>,
    },

    // ------------------------------------------------------------------
    // Arithmetic
    // ------------------------------------------------------------------
    /// Sum of all children.
    Add,
    /// Left-folded difference; negation with one child.
    Sub,
    /// Product of all children.
    Mul,
    /// Left-folded quotient; reciprocal with one child.
    Div,
    /// `a / sqrt(1 + b²)`.
    AnalyticQuotient,

    // ------------------------------------------------------------------
    // Unary functions
    // ------------------------------------------------------------------
    /// Natural logarithm.
    Log,
    /// Exponential.
    Exp,
    /// Square root.
    Sqrt,
    /// Real cube root.
    CubeRoot,
    /// `x²`.
    Square,
    /// `x³`.
    Cube,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Tangent.
    Tan,
    /// Hyperbolic tangent.
    Tanh,
    /// Error function.
    Erf,
    /// Standard normal density.
    Norm,
    /// Absolute value.
    Abs,

    // ------------------------------------------------------------------
    // Integer powers
    // ------------------------------------------------------------------
    /// `a^n` with an integral exponent child.
    Power,
    /// `a^(1/n)` with an integral exponent child.
    Root,

    // ------------------------------------------------------------------
    // Vector aggregates
    // ------------------------------------------------------------------
    /// Sum of vector elements.
    Sum,
    /// Mean of vector elements.
    Mean,
    /// Sample standard deviation of vector elements.
    StandardDeviation,
    /// Sample variance of vector elements.
    Variance,
    /// Number of vector elements.
    Length,

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------
    /// Root wrapper; the anchor of the optional `α·f(x) + β` scaling.
    ProgramRoot,

    // ------------------------------------------------------------------
    // Symbols without a differentiable primitive
    // ------------------------------------------------------------------
    /// `if c > 0 then a else b`.
    IfThenElse,
    /// `1` if `a > b`, else `-1`.
    GreaterThan,
    /// `1` if `a < b`, else `-1`.
    LessThan,
    /// `1` if all children are positive, else `-1`.
    And,
    /// `1` if any child is positive, else `-1`.
    Or,
    /// `-1` if the child is positive, else `1`.
    Not,
    /// Element-wise minimum.
    Min,
    /// Element-wise maximum.
    Max,
    /// Symbol registered by a host grammar but unknown to this crate.
    Unknown(String),
}

impl Symbol {
    /// Display name of the symbol.
    pub fn name(&self) -> &str {
        match self {
            Symbol::Constant { .. } => "Constant",
            Symbol::FixedConstant { .. } => "FixedConstant",
            Symbol::Variable { .. } => "Variable",
            Symbol::BinaryFactorVariable { .. } => "BinaryFactorVariable",
            Symbol::FactorVariable { .. } => "FactorVariable",
            Symbol::Add => "Addition",
            Symbol::Sub => "Subtraction",
            Symbol::Mul => "Multiplication",
            Symbol::Div => "Division",
            Symbol::AnalyticQuotient => "AnalyticQuotient",
            Symbol::Log => "Logarithm",
            Symbol::Exp => "Exponential",
            Symbol::Sqrt => "SquareRoot",
            Symbol::CubeRoot => "CubeRoot",
            Symbol::Square => "Square",
            Symbol::Cube => "Cube",
            Symbol::Sin => "Sine",
            Symbol::Cos => "Cosine",
            Symbol::Tan => "Tangent",
            Symbol::Tanh => "HyperbolicTangent",
            Symbol::Erf => "Erf",
            Symbol::Norm => "Norm",
            Symbol::Abs => "Absolute",
            Symbol::Power => "Power",
            Symbol::Root => "Root",
            Symbol::Sum => "Sum",
            Symbol::Mean => "Mean",
            Symbol::StandardDeviation => "StandardDeviation",
            Symbol::Variance => "Variance",
            Symbol::Length => "Length",
            Symbol::ProgramRoot => "ProgramRoot",
            Symbol::IfThenElse => "IfThenElse",
            Symbol::GreaterThan => "GreaterThan",
            Symbol::LessThan => "LessThan",
            Symbol::And => "And",
            Symbol::Or => "Or",
            Symbol::Not => "Not",
            Symbol::Min => "Min",
            Symbol::Max => "Max",
            Symbol::Unknown(name) => name.as_str(),
        }
    }

    /// Whether the symbol is a leaf kind.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Symbol::Constant { .. }
                | Symbol::FixedConstant { .. }
                | Symbol::Variable { .. }
                | Symbol::BinaryFactorVariable { .. }
                | Symbol::FactorVariable { .. }
        )
    }

    /// Whether the second child is an integral exponent.
    #[inline]
    pub fn has_exponent(&self) -> bool {
        matches!(self, Symbol::Power | Symbol::Root)
    }
}
