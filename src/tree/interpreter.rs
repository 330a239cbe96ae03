//! Ordinary (non-differentiable) tree evaluation and evaluation traces.
//!
//! ## Purpose
//!
//! This module evaluates a [`SymbolicExpressionTree`] row by row against a
//! [`Dataset`]. It is used to score trees (fit quality) and to record an
//! [`EvaluationTrace`], the per-node value shapes the graph builder needs to
//! expand vector-valued subtrees.
//!
//! ## Design notes
//!
//! * **Eager recursion**: Each node returns a [`Value`]; operators evaluate
//!   all children first.
//! * **Broadcasting**: A scalar combines with every element of a vector;
//!   vectors of equal length combine element-wise.
//! * **Every symbol**: The interpreter handles all symbols except `Unknown`,
//!   including those without a differentiable primitive.
//!
//! ## Key concepts
//!
//! * **Shape**: `Scalar` or `Vector(len)` of a node's value on a row.
//! * **Consistency**: A node must have the same shape on every traced row.
//!
//! ## Invariants
//!
//! * The trace covers every node of the tree, indexed by [`NodeId`].

use crate::math::special;
use crate::primitives::errors::FitError;
use crate::tree::dataset::{Dataset, VariableType};
use crate::tree::node::{NodeId, SymbolicExpressionTree, TreeNode};
use crate::tree::symbol::Symbol;

// ============================================================================
// Values and shapes
// ============================================================================

/// Value of a node on one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Single number.
    Scalar(f64),
    /// Vector of numbers.
    Vector(Vec<f64>),
}

impl Value {
    /// Shape of the value.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Scalar(_) => Shape::Scalar,
            Value::Vector(v) => Shape::Vector(v.len()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(v) => v.len(),
        }
    }

    fn at(&self, i: usize) -> f64 {
        match self {
            Value::Scalar(x) => *x,
            Value::Vector(v) if v.len() == 1 => v[0],
            Value::Vector(v) => v[i],
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(x) => Value::Scalar(f(x)),
            Value::Vector(v) => Value::Vector(v.into_iter().map(f).collect()),
        }
    }

    fn elements(&self) -> Vec<f64> {
        match self {
            Value::Scalar(x) => vec![*x],
            Value::Vector(v) => v.clone(),
        }
    }
}

/// Shape of a node's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Single number.
    Scalar,
    /// Vector of the given length.
    Vector(usize),
}

impl Shape {
    /// Number of elements (`1` for scalars).
    pub fn len(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector(n) => *n,
        }
    }

    /// Whether the shape has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-node value shapes recorded over a set of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTrace {
    shapes: Vec<Shape>,
}

impl EvaluationTrace {
    /// Create a trace from shapes in prefix order.
    pub fn from_shapes(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// Shape of a node, if the node was traced.
    pub fn shape(&self, node: NodeId) -> Option<Shape> {
        self.shapes.get(node.0).copied()
    }

    /// Number of traced nodes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether no nodes were traced.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

// ============================================================================
// Interpreter
// ============================================================================

/// Ordinary tree evaluator.
pub struct Interpreter;

impl Interpreter {
    /// Evaluate the tree on one row.
    ///
    /// The root must produce a scalar.
    pub fn evaluate_row<D: Dataset + ?Sized>(
        tree: &SymbolicExpressionTree,
        dataset: &D,
        row: usize,
    ) -> Result<f64, FitError> {
        let mut walk = Walk::new(dataset, row, None);
        match walk.node(tree.root())? {
            Value::Scalar(x) => Ok(x),
            Value::Vector(v) => Err(FitError::BroadcastMismatch {
                node: NodeId(0),
                left: v.len(),
                right: 1,
            }),
        }
    }

    /// Evaluate the tree on each of `rows`.
    pub fn evaluate<D: Dataset + ?Sized>(
        tree: &SymbolicExpressionTree,
        dataset: &D,
        rows: &[usize],
    ) -> Result<Vec<f64>, FitError> {
        rows.iter()
            .map(|&row| Self::evaluate_row(tree, dataset, row))
            .collect()
    }

    /// Record the shape of every node over `rows`.
    pub fn evaluation_trace<D: Dataset + ?Sized>(
        tree: &SymbolicExpressionTree,
        dataset: &D,
        rows: &[usize],
    ) -> Result<EvaluationTrace, FitError> {
        if rows.is_empty() {
            return Err(FitError::EmptyRows);
        }

        let mut reference: Option<Vec<Shape>> = None;
        for &row in rows {
            let mut shapes = Vec::with_capacity(tree.len());
            Walk::new(dataset, row, Some(&mut shapes)).node(tree.root())?;
            match reference {
                None => reference = Some(shapes),
                Some(ref first) => {
                    if let Some(i) = first.iter().zip(&shapes).position(|(a, b)| a != b) {
                        return Err(FitError::InconsistentVectorLength { node: NodeId(i) });
                    }
                }
            }
        }

        Ok(EvaluationTrace::from_shapes(reference.unwrap_or_default()))
    }
}

// ============================================================================
// Recursive walk
// ============================================================================

struct Walk<'a, D: ?Sized> {
    dataset: &'a D,
    row: usize,
    next_id: usize,
    shapes: Option<&'a mut Vec<Shape>>,
}

impl<'a, D: Dataset + ?Sized> Walk<'a, D> {
    fn new(dataset: &'a D, row: usize, shapes: Option<&'a mut Vec<Shape>>) -> Self {
        Self {
            dataset,
            row,
            next_id: 0,
            shapes,
        }
    }

    fn node(&mut self, node: &TreeNode) -> Result<Value, FitError> {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        // Reserve the prefix slot before children fill theirs.
        if let Some(shapes) = self.shapes.as_deref_mut() {
            shapes.push(Shape::Scalar);
        }

        let value = self.apply(id, node)?;

        if let Some(shapes) = self.shapes.as_deref_mut() {
            shapes[id.0] = value.shape();
        }
        Ok(value)
    }

    fn children(&mut self, node: &TreeNode) -> Result<Vec<Value>, FitError> {
        node.children.iter().map(|c| self.node(c)).collect()
    }

    fn apply(&mut self, id: NodeId, node: &TreeNode) -> Result<Value, FitError> {
        let value = match &node.symbol {
            Symbol::Constant { value } | Symbol::FixedConstant { value } => Value::Scalar(*value),
            Symbol::Variable {
                name,
                weight,
                lag,
                index,
            } => self.variable(name, *weight, *lag, *index)?,
            Symbol::BinaryFactorVariable {
                name,
                category,
                weight,
            } => {
                let level = self.dataset.string_value(name, self.row)?;
                Value::Scalar(if level == category { *weight } else { 0.0 })
            }
            Symbol::FactorVariable { name, weights } => {
                let level = self.dataset.string_value(name, self.row)?;
                let w = weights
                    .iter()
                    .find(|(c, _)| c == level)
                    .map_or(0.0, |(_, w)| *w);
                Value::Scalar(w)
            }

            Symbol::Add => self.fold(id, node, |a, b| a + b, |x| x)?,
            Symbol::Mul => self.fold(id, node, |a, b| a * b, |x| x)?,
            Symbol::Sub => self.fold(id, node, |a, b| a - b, |x| -x)?,
            Symbol::Div => self.fold(id, node, |a, b| a / b, |x| 1.0 / x)?,
            Symbol::Min => self.fold(id, node, f64::min, |x| x)?,
            Symbol::Max => self.fold(id, node, f64::max, |x| x)?,
            Symbol::And => self.fold(id, node, |a, b| truth(a > 0.0 && b > 0.0), truth_of)?,
            Symbol::Or => self.fold(id, node, |a, b| truth(a > 0.0 || b > 0.0), truth_of)?,
            Symbol::AnalyticQuotient => {
                let (a, b) = self.pair(id, node)?;
                zip(id, &a, &b, |a, b| a / (1.0 + b * b).sqrt())?
            }
            Symbol::GreaterThan => {
                let (a, b) = self.pair(id, node)?;
                zip(id, &a, &b, |a, b| truth(a > b))?
            }
            Symbol::LessThan => {
                let (a, b) = self.pair(id, node)?;
                zip(id, &a, &b, |a, b| truth(a < b))?
            }
            Symbol::Not => self.single(id, node)?.map(|x| truth(x <= 0.0)),
            Symbol::IfThenElse => {
                let args = self.children(node)?;
                let [condition, then, otherwise] = args.as_slice() else {
                    return Err(unsupported(id, node));
                };
                let n = broadcast_len(id, condition.len(), then.len())?;
                let n = broadcast_len(id, n, otherwise.len())?;
                select(n, condition, then, otherwise)
            }

            Symbol::Log => self.single(id, node)?.map(f64::ln),
            Symbol::Exp => self.single(id, node)?.map(f64::exp),
            Symbol::Sqrt => self.single(id, node)?.map(f64::sqrt),
            Symbol::CubeRoot => self.single(id, node)?.map(f64::cbrt),
            Symbol::Square => self.single(id, node)?.map(|x| x * x),
            Symbol::Cube => self.single(id, node)?.map(|x| x * x * x),
            Symbol::Sin => self.single(id, node)?.map(f64::sin),
            Symbol::Cos => self.single(id, node)?.map(f64::cos),
            Symbol::Tan => self.single(id, node)?.map(f64::tan),
            Symbol::Tanh => self.single(id, node)?.map(f64::tanh),
            Symbol::Erf => self.single(id, node)?.map(special::erf),
            Symbol::Norm => self.single(id, node)?.map(special::normal_density),
            Symbol::Abs => self.single(id, node)?.map(f64::abs),

            Symbol::Power => {
                let (base, exponent) = self.pair(id, node)?;
                let Value::Scalar(n) = exponent else {
                    return Err(unsupported(id, node));
                };
                let n = n.round();
                base.map(|x| x.powf(n))
            }
            Symbol::Root => {
                let (base, exponent) = self.pair(id, node)?;
                let Value::Scalar(n) = exponent else {
                    return Err(unsupported(id, node));
                };
                let n = n.round() as i32;
                base.map(|x| special::integer_root(x, n))
            }

            Symbol::Sum => Value::Scalar(self.single(id, node)?.elements().iter().sum()),
            Symbol::Mean => {
                let v = self.single(id, node)?.elements();
                Value::Scalar(v.iter().sum::<f64>() / v.len() as f64)
            }
            Symbol::Variance => Value::Scalar(sample_variance(&self.single(id, node)?.elements())),
            Symbol::StandardDeviation => {
                Value::Scalar(sample_variance(&self.single(id, node)?.elements()).sqrt())
            }
            Symbol::Length => Value::Scalar(self.single(id, node)?.len() as f64),

            Symbol::ProgramRoot => self.single(id, node)?,

            Symbol::Unknown(_) => return Err(unsupported(id, node)),
        };
        Ok(value)
    }

    fn variable(
        &self,
        name: &str,
        weight: f64,
        lag: i32,
        index: Option<usize>,
    ) -> Result<Value, FitError> {
        let rows = self.dataset.row_count();
        let row = self.row as i64 + i64::from(lag);
        if row < 0 || row >= rows as i64 {
            return Err(FitError::RowOutOfRange { row, rows });
        }
        let row = row as usize;

        match self.dataset.variable_type(name) {
            Some(VariableType::Double) => {
                Ok(Value::Scalar(weight * self.dataset.double_value(name, row)?))
            }
            Some(VariableType::DoubleVector) => {
                let v = self.dataset.double_vector_value(name, row)?;
                match index {
                    Some(i) => v.get(i).map(|x| Value::Scalar(weight * x)).ok_or_else(|| {
                        FitError::IndexOutOfRange {
                            variable: name.to_string(),
                            index: i,
                            len: v.len(),
                        }
                    }),
                    None => Ok(Value::Vector(v.iter().map(|x| weight * x).collect())),
                }
            }
            Some(VariableType::String) => Err(FitError::VariableTypeMismatch {
                variable: name.to_string(),
                expected: VariableType::Double.name(),
            }),
            None => Err(FitError::UnknownVariable(name.to_string())),
        }
    }

    fn single(&mut self, id: NodeId, node: &TreeNode) -> Result<Value, FitError> {
        let mut args = self.children(node)?;
        match args.len() {
            1 => Ok(args.remove(0)),
            _ => Err(unsupported(id, node)),
        }
    }

    fn pair(&mut self, id: NodeId, node: &TreeNode) -> Result<(Value, Value), FitError> {
        let mut args = self.children(node)?.into_iter();
        match (args.next(), args.next(), args.next()) {
            (Some(a), Some(b), None) => Ok((a, b)),
            _ => Err(unsupported(id, node)),
        }
    }

    /// Left fold over all children; a single child goes through `unary`.
    fn fold(
        &mut self,
        id: NodeId,
        node: &TreeNode,
        binary: impl Fn(f64, f64) -> f64 + Copy,
        unary: impl Fn(f64) -> f64,
    ) -> Result<Value, FitError> {
        let mut args = self.children(node)?.into_iter();
        let Some(first) = args.next() else {
            return Err(unsupported(id, node));
        };
        let mut rest = args.peekable();
        if rest.peek().is_none() {
            return Ok(first.map(unary));
        }
        let mut acc = first;
        for arg in rest {
            acc = zip(id, &acc, &arg, binary)?;
        }
        Ok(acc)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn unsupported(node: NodeId, tree_node: &TreeNode) -> FitError {
    FitError::UnsupportedSymbol {
        node,
        symbol: tree_node.symbol.name().to_string(),
    }
}

#[inline]
fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        -1.0
    }
}

#[inline]
fn truth_of(x: f64) -> f64 {
    truth(x > 0.0)
}

fn broadcast_len(node: NodeId, left: usize, right: usize) -> Result<usize, FitError> {
    match (left, right) {
        (l, r) if l == r => Ok(l),
        (1, r) => Ok(r),
        (l, 1) => Ok(l),
        (left, right) => Err(FitError::BroadcastMismatch { node, left, right }),
    }
}

fn zip(node: NodeId, a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, FitError> {
    match (a, b) {
        (Value::Scalar(x), Value::Scalar(y)) => Ok(Value::Scalar(f(*x, *y))),
        _ => {
            let n = broadcast_len(node, a.len(), b.len())?;
            Ok(Value::Vector((0..n).map(|i| f(a.at(i), b.at(i))).collect()))
        }
    }
}

fn select(n: usize, condition: &Value, then: &Value, otherwise: &Value) -> Value {
    let pick = |i: usize| {
        if condition.at(i) > 0.0 {
            then.at(i)
        } else {
            otherwise.at(i)
        }
    };
    match (condition, then, otherwise) {
        (Value::Scalar(_), Value::Scalar(_), Value::Scalar(_)) => Value::Scalar(pick(0)),
        _ => Value::Vector((0..n).map(pick).collect()),
    }
}

/// Sample variance with `n - 1` in the denominator; NaN for fewer than two elements.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1) as f64
}
