//! Differentiable term graph.
//!
//! ## Purpose
//!
//! This module provides [`TermGraph`], the differentiable counterpart of a
//! symbolic expression tree. A graph maps a parameter vector and one row of
//! inputs to a scalar, and yields the gradient of that scalar with respect
//! to every parameter.
//!
//! ## Design notes
//!
//! * **Arena**: Terms live in a flat vector and refer to operands by
//!   [`TermId`]. Operands always precede their users, so forward evaluation
//!   is a single left-to-right pass.
//! * **Reverse mode**: The gradient is accumulated in one backward pass over
//!   the arena, so its cost does not grow with the number of parameters.
//! * **Closed primitives**: [`UnaryOp`] and [`BinaryOp`] pair every function
//!   with its closed-form derivative.
//!
//! ## Key concepts
//!
//! * **Param**: Reads entry `i` of the parameter vector.
//! * **Input**: Reads column `j` of the current row.
//! * **Literal**: A constant baked into the graph.
//!
//! ## Invariants
//!
//! * Operand ids are strictly smaller than the id of the term using them.
//! * A graph has exactly one output term once built.
//!
//! ## Non-goals
//!
//! * Higher-order derivatives.
//! * Graph simplification or common subexpression elimination.

use crate::math::special;
use crate::primitives::buffer::GraphBuffer;

// ============================================================================
// Primitives
// ============================================================================

/// Index of a term in a [`TermGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId(pub usize);

/// Single-argument primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `1 / x`
    Recip,
    /// `ln x`
    Log,
    /// `e^x`
    Exp,
    /// `√x`
    Sqrt,
    /// `∛x`
    Cbrt,
    /// `x²`
    Square,
    /// `x³`
    Cube,
    /// `sin x`
    Sin,
    /// `cos x`
    Cos,
    /// `tan x`
    Tan,
    /// `tanh x`
    Tanh,
    /// Error function.
    Erf,
    /// Standard normal density.
    Norm,
    /// `|x|`
    Abs,
    /// `x^n`
    Powi(i32),
    /// `x^(1/n)`
    Root(i32),
}

impl UnaryOp {
    /// Function value.
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Recip => 1.0 / x,
            UnaryOp::Log => x.ln(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Cbrt => x.cbrt(),
            UnaryOp::Square => x * x,
            UnaryOp::Cube => x * x * x,
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Erf => special::erf(x),
            UnaryOp::Norm => special::normal_density(x),
            UnaryOp::Abs => x.abs(),
            UnaryOp::Powi(n) => x.powi(n),
            UnaryOp::Root(n) => special::integer_root(x, n),
        }
    }

    /// Derivative at `x`, given the already computed value `y = f(x)`.
    #[inline]
    pub fn derivative(self, x: f64, y: f64) -> f64 {
        match self {
            UnaryOp::Neg => -1.0,
            UnaryOp::Recip => -1.0 / (x * x),
            UnaryOp::Log => 1.0 / x,
            UnaryOp::Exp => y,
            UnaryOp::Sqrt => 0.5 / y,
            UnaryOp::Cbrt => 1.0 / (3.0 * y * y),
            UnaryOp::Square => 2.0 * x,
            UnaryOp::Cube => 3.0 * x * x,
            UnaryOp::Sin => x.cos(),
            UnaryOp::Cos => -x.sin(),
            UnaryOp::Tan => 1.0 + y * y,
            UnaryOp::Tanh => 1.0 - y * y,
            UnaryOp::Erf => special::erf_derivative(x),
            UnaryOp::Norm => -x * y,
            UnaryOp::Abs => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum()
                }
            }
            UnaryOp::Powi(0) => 0.0,
            UnaryOp::Powi(n) => f64::from(n) * x.powi(n - 1),
            UnaryOp::Root(n) => y / (f64::from(n) * x),
        }
    }
}

/// Two-argument primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a / √(1 + b²)`
    AnalyticQuotient,
}

impl BinaryOp {
    /// Function value.
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::AnalyticQuotient => a / (1.0 + b * b).sqrt(),
        }
    }

    /// Partial derivatives `(∂/∂a, ∂/∂b)`.
    #[inline]
    pub fn partials(self, a: f64, b: f64) -> (f64, f64) {
        match self {
            BinaryOp::Add => (1.0, 1.0),
            BinaryOp::Sub => (1.0, -1.0),
            BinaryOp::Mul => (b, a),
            BinaryOp::Div => (1.0 / b, -a / (b * b)),
            BinaryOp::AnalyticQuotient => {
                let s = (1.0 + b * b).sqrt();
                (1.0 / s, -a * b / (s * s * s))
            }
        }
    }
}

/// One node of the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Entry of the parameter vector.
    Param(usize),
    /// Column of the input row.
    Input(usize),
    /// Constant.
    Literal(f64),
    /// Unary primitive applied to an operand.
    Unary(UnaryOp, TermId),
    /// Binary primitive applied to two operands.
    Binary(BinaryOp, TermId, TermId),
    /// Sum of any number of operands.
    Sum(Vec<TermId>),
}

// ============================================================================
// Graph
// ============================================================================

/// Arena of terms with a designated output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermGraph {
    terms: Vec<Term>,
    output: Option<TermId>,
}

impl TermGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, term: Term) -> TermId {
        self.terms.push(term);
        TermId(self.terms.len() - 1)
    }

    /// Add a parameter reference.
    pub fn param(&mut self, index: usize) -> TermId {
        self.push(Term::Param(index))
    }

    /// Add an input column reference.
    pub fn input(&mut self, column: usize) -> TermId {
        self.push(Term::Input(column))
    }

    /// Add a literal.
    pub fn literal(&mut self, value: f64) -> TermId {
        self.push(Term::Literal(value))
    }

    /// Add a unary primitive.
    pub fn unary(&mut self, op: UnaryOp, operand: TermId) -> TermId {
        self.push(Term::Unary(op, operand))
    }

    /// Add a binary primitive.
    pub fn binary(&mut self, op: BinaryOp, left: TermId, right: TermId) -> TermId {
        self.push(Term::Binary(op, left, right))
    }

    /// Add an n-ary sum.
    pub fn sum(&mut self, operands: Vec<TermId>) -> TermId {
        self.push(Term::Sum(operands))
    }

    /// Mark the output term.
    pub fn set_output(&mut self, output: TermId) {
        self.output = Some(output);
    }

    /// Output term, if set.
    pub fn output(&self) -> Option<TermId> {
        self.output
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the graph has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in evaluation order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate the output on one row.
    ///
    /// Returns NaN for a graph without output.
    pub fn evaluate(&self, params: &[f64], inputs: &[f64], buffer: &mut GraphBuffer) -> f64 {
        self.forward(params, inputs, buffer);
        match self.output {
            Some(out) => buffer.values[out.0],
            None => f64::NAN,
        }
    }

    /// Evaluate the output on one row and write `∂output/∂params` into `gradient`.
    pub fn evaluate_with_gradient(
        &self,
        params: &[f64],
        inputs: &[f64],
        buffer: &mut GraphBuffer,
        gradient: &mut [f64],
    ) -> f64 {
        gradient.iter_mut().for_each(|g| *g = 0.0);
        self.forward(params, inputs, buffer);
        let Some(out) = self.output else {
            return f64::NAN;
        };

        buffer.adjoints.reset(self.terms.len(), 0.0);
        buffer.adjoints[out.0] = 1.0;

        for (i, term) in self.terms.iter().enumerate().rev() {
            let adjoint = buffer.adjoints[i];
            if adjoint == 0.0 {
                continue;
            }
            match term {
                Term::Param(p) => gradient[*p] += adjoint,
                Term::Input(_) | Term::Literal(_) => {}
                Term::Unary(op, a) => {
                    let x = buffer.values[a.0];
                    let y = buffer.values[i];
                    buffer.adjoints[a.0] += adjoint * op.derivative(x, y);
                }
                Term::Binary(op, a, b) => {
                    let (da, db) = op.partials(buffer.values[a.0], buffer.values[b.0]);
                    buffer.adjoints[a.0] += adjoint * da;
                    buffer.adjoints[b.0] += adjoint * db;
                }
                Term::Sum(operands) => {
                    for a in operands {
                        buffer.adjoints[a.0] += adjoint;
                    }
                }
            }
        }

        buffer.values[out.0]
    }

    fn forward(&self, params: &[f64], inputs: &[f64], buffer: &mut GraphBuffer) {
        buffer.values.reset(self.terms.len(), 0.0);
        for (i, term) in self.terms.iter().enumerate() {
            let v = match term {
                Term::Param(p) => params[*p],
                Term::Input(c) => inputs[*c],
                Term::Literal(v) => *v,
                Term::Unary(op, a) => op.apply(buffer.values[a.0]),
                Term::Binary(op, a, b) => op.apply(buffer.values[a.0], buffer.values[b.0]),
                Term::Sum(operands) => operands.iter().map(|a| buffer.values[a.0]).sum(),
            };
            buffer.values[i] = v;
        }
    }
}

// ============================================================================
// Model Interface
// ============================================================================

/// A scalar model differentiable in its parameters.
///
/// The fitting driver only sees this interface, so any model with an
/// analytic gradient can be fitted, not just term graphs.
pub trait DifferentiableModel {
    /// Number of parameters the model expects.
    fn parameter_count(&self) -> usize;

    /// Model output for one input row.
    fn value(&mut self, params: &[f64], inputs: &[f64]) -> f64;

    /// Model output for one input row, writing the parameter gradient into `gradient`.
    fn value_and_gradient(&mut self, params: &[f64], inputs: &[f64], gradient: &mut [f64]) -> f64;
}
