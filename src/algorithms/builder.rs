//! Term graph builder.
//!
//! ## Purpose
//!
//! This module translates a [`SymbolicExpressionTree`] into a [`TermGraph`],
//! discovering every tunable quantity of the tree (a [`ParameterSlot`]) and
//! every data column it reads (an [`InputSlot`]).
//!
//! ## Design notes
//!
//! * **Prefix order**: Parameter slots are created in prefix traversal order.
//!   Write-back walks the tree in the same order, which makes slots and
//!   tunable leaves a bijection.
//! * **Vector subtrees**: A subtree that evaluates to a vector becomes a list
//!   of terms, one per element. Lengths come from an [`EvaluationTrace`].
//! * **All or nothing**: The first symbol without a differentiable primitive
//!   aborts the build.
//!
//! ## Key concepts
//!
//! * **Linear scaling**: The output becomes `α·f(x) + β` with `β` and `α` as
//!   the first two parameters.
//! * **Excluded nodes**: Constants and weights of excluded nodes are baked in
//!   as literals.
//! * **Input dedup**: Two leaves reading the same column share an input slot.
//!
//! ## Invariants
//!
//! * With linear scaling, `parameters[0]` is `β` and `parameters[1]` is `α`.
//! * The exponent child of `Power`/`Root` never produces a parameter.
//! * The graph output is scalar.

use std::collections::HashSet;

use crate::algorithms::term::{BinaryOp, DifferentiableModel, TermGraph, TermId, UnaryOp};
use crate::primitives::buffer::GraphBuffer;
use crate::primitives::errors::FitError;
use crate::tree::interpreter::{EvaluationTrace, Shape};
use crate::tree::node::{NodeId, SymbolicExpressionTree, TreeNode};
use crate::tree::symbol::Symbol;

// ============================================================================
// Slots and options
// ============================================================================

/// What a parameter slot tunes.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// Value of a `Constant` node.
    Constant,
    /// Weight of a `Variable` or `BinaryFactorVariable` node.
    VariableWeight,
    /// Weight of one category of a `FactorVariable` node.
    FactorWeight {
        /// Category label.
        category: String,
    },
    /// Additive term `β` of linear scaling.
    ScalingOffset,
    /// Multiplicative term `α` of linear scaling.
    ScalingFactor,
}

/// A tunable quantity discovered in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSlot {
    /// Node owning the quantity (the root for scaling terms).
    pub node: NodeId,
    /// Kind of quantity.
    pub kind: ParameterKind,
    /// Value in the tree before optimization.
    pub initial: f64,
}

/// A data column the graph reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSlot {
    /// Dataset variable.
    pub variable: String,
    /// For factor indicators, the category that maps to `1`.
    pub category: Option<String>,
    /// Row offset.
    pub lag: i32,
    /// Element of a vector-valued variable.
    pub index: Option<usize>,
}

/// Options controlling which quantities become parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Turn variable and factor weights into parameters.
    pub include_variable_weights: bool,
    /// Wrap the output in `α·f(x) + β`.
    pub include_linear_scaling: bool,
    /// Nodes whose values stay fixed.
    pub excluded_nodes: HashSet<NodeId>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_variable_weights: true,
            include_linear_scaling: false,
            excluded_nodes: HashSet::new(),
        }
    }
}

// ============================================================================
// Built model
// ============================================================================

/// Output of [`TermGraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct BuiltModel {
    /// Differentiable graph.
    pub graph: TermGraph,
    /// Parameter slots in parameter-vector order.
    pub parameters: Vec<ParameterSlot>,
    /// Input slots in input-column order.
    pub inputs: Vec<InputSlot>,
    /// Whether the first two parameters are `β` and `α`.
    pub linear_scaling: bool,
    buffer: GraphBuffer,
}

impl BuiltModel {
    /// Parameter vector seeded from the tree.
    pub fn initial_parameters(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.initial).collect()
    }

    /// Whether the model has nothing to tune.
    pub fn is_degenerate(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl DifferentiableModel for BuiltModel {
    fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    fn value(&mut self, params: &[f64], inputs: &[f64]) -> f64 {
        self.graph.evaluate(params, inputs, &mut self.buffer)
    }

    fn value_and_gradient(&mut self, params: &[f64], inputs: &[f64], gradient: &mut [f64]) -> f64 {
        self.graph
            .evaluate_with_gradient(params, inputs, &mut self.buffer, gradient)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Translates trees into differentiable term graphs.
pub struct TermGraphBuilder;

impl TermGraphBuilder {
    /// Build the term graph of `tree`.
    ///
    /// `trace` supplies the shapes of vector-valued nodes; without it every
    /// node is assumed to be scalar.
    pub fn build(
        tree: &SymbolicExpressionTree,
        options: &BuildOptions,
        trace: Option<&EvaluationTrace>,
    ) -> Result<BuiltModel, FitError> {
        let mut state = Build {
            options,
            trace,
            graph: TermGraph::new(),
            parameters: Vec::new(),
            inputs: Vec::new(),
            next_id: 0,
        };

        let scaling = if options.include_linear_scaling {
            let beta = state.parameter(NodeId(0), ParameterKind::ScalingOffset, 0.0);
            let alpha = state.parameter(NodeId(0), ParameterKind::ScalingFactor, 1.0);
            Some((alpha, beta))
        } else {
            None
        };

        let output = match state.node(tree.root())? {
            Terms::One(t) => t,
            Terms::Many(v) => {
                return Err(FitError::BroadcastMismatch {
                    node: NodeId(0),
                    left: v.len(),
                    right: 1,
                })
            }
        };

        let output = match scaling {
            Some((alpha, beta)) => {
                let scaled = state.graph.binary(BinaryOp::Mul, alpha, output);
                state.graph.binary(BinaryOp::Add, scaled, beta)
            }
            None => output,
        };
        state.graph.set_output(output);

        let nodes = state.graph.len();
        log::debug!(
            "built term graph: {} terms, {} parameters, {} inputs",
            nodes,
            state.parameters.len(),
            state.inputs.len()
        );

        Ok(BuiltModel {
            graph: state.graph,
            parameters: state.parameters,
            inputs: state.inputs,
            linear_scaling: options.include_linear_scaling,
            buffer: GraphBuffer::new(nodes),
        })
    }
}

/// Terms of one subtree: a scalar or one term per vector element.
#[derive(Debug, Clone)]
enum Terms {
    One(TermId),
    Many(Vec<TermId>),
}

impl Terms {
    fn len(&self) -> usize {
        match self {
            Terms::One(_) => 1,
            Terms::Many(v) => v.len(),
        }
    }

    /// Element `i` under broadcasting: scalars and length-1 vectors repeat.
    fn at(&self, i: usize) -> TermId {
        match self {
            Terms::One(t) => *t,
            Terms::Many(v) if v.len() == 1 => v[0],
            Terms::Many(v) => v[i],
        }
    }

    fn into_vec(self) -> Vec<TermId> {
        match self {
            Terms::One(t) => vec![t],
            Terms::Many(v) => v,
        }
    }
}

struct Build<'a> {
    options: &'a BuildOptions,
    trace: Option<&'a EvaluationTrace>,
    graph: TermGraph,
    parameters: Vec<ParameterSlot>,
    inputs: Vec<InputSlot>,
    next_id: usize,
}

impl Build<'_> {
    fn parameter(&mut self, node: NodeId, kind: ParameterKind, initial: f64) -> TermId {
        let index = self.parameters.len();
        self.parameters.push(ParameterSlot {
            node,
            kind,
            initial,
        });
        self.graph.param(index)
    }

    fn input(&mut self, slot: InputSlot) -> TermId {
        let column = match self.inputs.iter().position(|s| *s == slot) {
            Some(c) => c,
            None => {
                self.inputs.push(slot);
                self.inputs.len() - 1
            }
        };
        self.graph.input(column)
    }

    fn tunable(&self, id: NodeId) -> bool {
        !self.options.excluded_nodes.contains(&id)
    }

    fn weights_tunable(&self, id: NodeId) -> bool {
        self.options.include_variable_weights && self.tunable(id)
    }

    /// Weight term for a variable-like leaf: a parameter or a literal.
    fn weight(&mut self, id: NodeId, kind: ParameterKind, value: f64) -> TermId {
        if self.weights_tunable(id) {
            self.parameter(id, kind, value)
        } else {
            self.graph.literal(value)
        }
    }

    fn node(&mut self, node: &TreeNode) -> Result<Terms, FitError> {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let terms = match &node.symbol {
            Symbol::Constant { value } => {
                let t = if self.tunable(id) {
                    self.parameter(id, ParameterKind::Constant, *value)
                } else {
                    self.graph.literal(*value)
                };
                Terms::One(t)
            }
            Symbol::FixedConstant { value } => Terms::One(self.graph.literal(*value)),
            Symbol::Variable {
                name,
                weight,
                lag,
                index,
            } => {
                let elements = match (index, self.shape(id)) {
                    (None, Shape::Vector(n)) => Some(n),
                    _ => None,
                };
                let w = self.weight(id, ParameterKind::VariableWeight, *weight);
                let slot = |index| InputSlot {
                    variable: name.clone(),
                    category: None,
                    lag: *lag,
                    index,
                };
                match elements {
                    None => {
                        let x = self.input(slot(*index));
                        Terms::One(self.graph.binary(BinaryOp::Mul, x, w))
                    }
                    Some(n) => {
                        let mut out = Vec::with_capacity(n);
                        for k in 0..n {
                            let x = self.input(slot(Some(k)));
                            out.push(self.graph.binary(BinaryOp::Mul, x, w));
                        }
                        Terms::Many(out)
                    }
                }
            }
            Symbol::BinaryFactorVariable {
                name,
                category,
                weight,
            } => {
                let w = self.weight(id, ParameterKind::VariableWeight, *weight);
                let x = self.input(InputSlot {
                    variable: name.clone(),
                    category: Some(category.clone()),
                    lag: 0,
                    index: None,
                });
                Terms::One(self.graph.binary(BinaryOp::Mul, x, w))
            }
            Symbol::FactorVariable { name, weights } => {
                let mut addends = Vec::with_capacity(weights.len());
                for (category, value) in weights {
                    let w = self.weight(
                        id,
                        ParameterKind::FactorWeight {
                            category: category.clone(),
                        },
                        *value,
                    );
                    let x = self.input(InputSlot {
                        variable: name.clone(),
                        category: Some(category.clone()),
                        lag: 0,
                        index: None,
                    });
                    addends.push(self.graph.binary(BinaryOp::Mul, x, w));
                }
                Terms::One(self.graph.sum(addends))
            }

            Symbol::Add => self.fold(id, node, BinaryOp::Add, None)?,
            Symbol::Mul => self.fold(id, node, BinaryOp::Mul, None)?,
            Symbol::Sub => self.fold(id, node, BinaryOp::Sub, Some(UnaryOp::Neg))?,
            Symbol::Div => self.fold(id, node, BinaryOp::Div, Some(UnaryOp::Recip))?,
            Symbol::AnalyticQuotient => {
                let [a, b] = self.children::<2>(id, node)?;
                self.combine(id, BinaryOp::AnalyticQuotient, &a, &b)?
            }

            Symbol::Log => self.map(id, node, UnaryOp::Log)?,
            Symbol::Exp => self.map(id, node, UnaryOp::Exp)?,
            Symbol::Sqrt => self.map(id, node, UnaryOp::Sqrt)?,
            Symbol::CubeRoot => self.map(id, node, UnaryOp::Cbrt)?,
            Symbol::Square => self.map(id, node, UnaryOp::Square)?,
            Symbol::Cube => self.map(id, node, UnaryOp::Cube)?,
            Symbol::Sin => self.map(id, node, UnaryOp::Sin)?,
            Symbol::Cos => self.map(id, node, UnaryOp::Cos)?,
            Symbol::Tan => self.map(id, node, UnaryOp::Tan)?,
            Symbol::Tanh => self.map(id, node, UnaryOp::Tanh)?,
            Symbol::Erf => self.map(id, node, UnaryOp::Erf)?,
            Symbol::Norm => self.map(id, node, UnaryOp::Norm)?,
            Symbol::Abs => self.map(id, node, UnaryOp::Abs)?,

            Symbol::Power | Symbol::Root => {
                let (base, exponent) = match node.children.as_slice() {
                    [base, exponent] => (base, exponent),
                    _ => return Err(unsupported(id, node)),
                };
                let base = self.node(base)?;
                let n = self.exponent(id, node, exponent)?;
                let op = if matches!(node.symbol, Symbol::Power) {
                    UnaryOp::Powi(n)
                } else if n != 0 {
                    UnaryOp::Root(n)
                } else {
                    return Err(unsupported(id, node));
                };
                self.apply_unary(op, base)
            }

            Symbol::Sum => {
                let xs = self.aggregand(id, node)?;
                Terms::One(self.graph.sum(xs))
            }
            Symbol::Mean => {
                let xs = self.aggregand(id, node)?;
                Terms::One(self.mean(xs))
            }
            Symbol::Variance => {
                let xs = self.aggregand(id, node)?;
                Terms::One(self.variance(xs))
            }
            Symbol::StandardDeviation => {
                let xs = self.aggregand(id, node)?;
                let var = self.variance(xs);
                Terms::One(self.graph.unary(UnaryOp::Sqrt, var))
            }
            Symbol::Length => {
                let xs = self.aggregand(id, node)?;
                Terms::One(self.graph.literal(xs.len() as f64))
            }

            Symbol::ProgramRoot => {
                let [x] = self.children::<1>(id, node)?;
                x
            }

            Symbol::IfThenElse
            | Symbol::GreaterThan
            | Symbol::LessThan
            | Symbol::And
            | Symbol::Or
            | Symbol::Not
            | Symbol::Min
            | Symbol::Max
            | Symbol::Unknown(_) => return Err(unsupported(id, node)),
        };
        Ok(terms)
    }

    fn shape(&self, id: NodeId) -> Shape {
        self.trace
            .and_then(|t| t.shape(id))
            .unwrap_or(Shape::Scalar)
    }

    fn children<const N: usize>(
        &mut self,
        id: NodeId,
        node: &TreeNode,
    ) -> Result<[Terms; N], FitError> {
        if node.children.len() != N {
            return Err(unsupported(id, node));
        }
        let built = node
            .children
            .iter()
            .map(|c| self.node(c))
            .collect::<Result<Vec<_>, _>>()?;
        built.try_into().map_err(|_| unsupported(id, node))
    }

    /// Element terms of an aggregate's single child, which the trace must
    /// record as vector-valued.
    fn aggregand(&mut self, id: NodeId, node: &TreeNode) -> Result<Vec<TermId>, FitError> {
        if !matches!(self.shape(NodeId(id.0 + 1)), Shape::Vector(_)) {
            return Err(unsupported(id, node));
        }
        let [x] = self.children::<1>(id, node)?;
        Ok(x.into_vec())
    }

    /// Integral exponent of `Power`/`Root`; consumes the exponent subtree.
    fn exponent(&mut self, id: NodeId, node: &TreeNode, exponent: &TreeNode) -> Result<i32, FitError> {
        self.next_id += exponent.len();
        let value = match (&exponent.symbol, exponent.children.is_empty()) {
            (Symbol::Constant { value } | Symbol::FixedConstant { value }, true) => *value,
            _ => return Err(unsupported(id, node)),
        };
        if !value.is_finite() || value.fract() != 0.0 || value.abs() > f64::from(i32::MAX) {
            return Err(unsupported(id, node));
        }
        Ok(value as i32)
    }

    fn map(&mut self, id: NodeId, node: &TreeNode, op: UnaryOp) -> Result<Terms, FitError> {
        let [x] = self.children::<1>(id, node)?;
        Ok(self.apply_unary(op, x))
    }

    fn apply_unary(&mut self, op: UnaryOp, x: Terms) -> Terms {
        match x {
            Terms::One(t) => Terms::One(self.graph.unary(op, t)),
            Terms::Many(v) => Terms::Many(v.into_iter().map(|t| self.graph.unary(op, t)).collect()),
        }
    }

    /// Left fold over all children; a single child goes through `single`.
    fn fold(
        &mut self,
        id: NodeId,
        node: &TreeNode,
        op: BinaryOp,
        single: Option<UnaryOp>,
    ) -> Result<Terms, FitError> {
        if node.children.is_empty() {
            return Err(unsupported(id, node));
        }
        let mut args = Vec::with_capacity(node.children.len());
        for child in &node.children {
            args.push(self.node(child)?);
        }
        let mut args = args.into_iter();
        let first = args.next().ok_or_else(|| unsupported(id, node))?;

        if node.children.len() == 1 {
            return Ok(match single {
                Some(op) => self.apply_unary(op, first),
                None => first,
            });
        }

        let mut acc = first;
        for arg in args {
            acc = self.combine(id, op, &acc, &arg)?;
        }
        Ok(acc)
    }

    /// Broadcast a binary primitive over two operands.
    fn combine(&mut self, id: NodeId, op: BinaryOp, a: &Terms, b: &Terms) -> Result<Terms, FitError> {
        match (a, b) {
            (Terms::One(x), Terms::One(y)) => Ok(Terms::One(self.graph.binary(op, *x, *y))),
            _ => {
                let n = match (a.len(), b.len()) {
                    (l, r) if l == r => l,
                    (1, r) => r,
                    (l, 1) => l,
                    (left, right) => {
                        return Err(FitError::BroadcastMismatch {
                            node: id,
                            left,
                            right,
                        })
                    }
                };
                let out = (0..n)
                    .map(|i| self.graph.binary(op, a.at(i), b.at(i)))
                    .collect();
                Ok(Terms::Many(out))
            }
        }
    }

    fn mean(&mut self, xs: Vec<TermId>) -> TermId {
        let n = xs.len() as f64;
        let total = self.graph.sum(xs);
        let scale = self.graph.literal(1.0 / n);
        self.graph.binary(BinaryOp::Mul, total, scale)
    }

    /// Sample variance; NaN literal for fewer than two elements.
    fn variance(&mut self, xs: Vec<TermId>) -> TermId {
        let n = xs.len();
        if n < 2 {
            return self.graph.literal(f64::NAN);
        }
        let mean = self.mean(xs.clone());
        let squares = xs
            .into_iter()
            .map(|x| {
                let d = self.graph.binary(BinaryOp::Sub, x, mean);
                self.graph.unary(UnaryOp::Square, d)
            })
            .collect();
        let total = self.graph.sum(squares);
        let scale = self.graph.literal(1.0 / (n - 1) as f64);
        self.graph.binary(BinaryOp::Mul, total, scale)
    }
}

fn unsupported(node: NodeId, tree_node: &TreeNode) -> FitError {
    FitError::UnsupportedSymbol {
        node,
        symbol: tree_node.symbol.name().to_string(),
    }
}
