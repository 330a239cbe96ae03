//! Write-back of optimized parameters into a tree.
//!
//! ## Purpose
//!
//! This module writes an optimized parameter vector into the tunable leaves
//! of a tree, visiting them in the same prefix order the graph builder used
//! to create the parameter slots.
//!
//! ## Design notes
//!
//! * **Count first**: The number of tunable leaves is checked against the
//!   parameter vector before anything is written, so a mismatch leaves the
//!   tree untouched.
//! * **Scaling stays out**: With linear scaling the leading `β`, `α` pair is
//!   not written into any leaf; [`LinearScaling::from_parameters`] exposes it.
//!
//! ## Invariants
//!
//! * Exponent children of `Power`/`Root` are never written.
//! * Tunable-leaf rules match the graph builder exactly.

use std::collections::HashSet;

use crate::primitives::errors::FitError;
use crate::tree::node::{NodeId, SymbolicExpressionTree, TreeNode};
use crate::tree::symbol::Symbol;

/// Options mirroring the build options of the parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBackOptions {
    /// Variable and factor weights are parameters.
    pub include_variable_weights: bool,
    /// The first two parameters are `β` and `α`.
    pub include_linear_scaling: bool,
    /// Nodes whose values were not optimized.
    pub excluded_nodes: HashSet<NodeId>,
}

/// Affine rescaling `α·f(x) + β` found by the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScaling {
    /// Multiplicative term.
    pub alpha: f64,
    /// Additive term.
    pub beta: f64,
}

impl LinearScaling {
    /// Read `β`, `α` from the head of a parameter vector.
    pub fn from_parameters(params: &[f64]) -> Option<Self> {
        match params {
            [beta, alpha, ..] => Some(Self {
                alpha: *alpha,
                beta: *beta,
            }),
            _ => None,
        }
    }
}

/// Write `params` into the tunable leaves of `tree`.
///
/// Returns the number of parameters consumed, which always equals
/// `params.len()` on success.
pub fn write_back(
    tree: &mut SymbolicExpressionTree,
    params: &[f64],
    options: &WriteBackOptions,
) -> Result<usize, FitError> {
    let offset = if options.include_linear_scaling { 2 } else { 0 };
    let leaves = tunable_leaf_count(tree, options);
    if params.len() != offset + leaves {
        return Err(FitError::ParameterCountMismatch {
            expected: offset + leaves,
            got: params.len(),
        });
    }

    let mut walk = Walk {
        options,
        params,
        next_param: offset,
        next_id: 0,
    };
    walk.node(tree.root_mut());

    log::trace!("wrote {} parameters back", walk.next_param);
    Ok(walk.next_param)
}

/// Number of leaf values write-back would assign, excluding scaling terms.
pub fn tunable_leaf_count(tree: &SymbolicExpressionTree, options: &WriteBackOptions) -> usize {
    fn count(node: &TreeNode, next_id: &mut usize, options: &WriteBackOptions) -> usize {
        let id = NodeId(*next_id);
        *next_id += 1;
        let mut total = leaf_slots(id, &node.symbol, options);
        let skip_exponent = node.symbol.has_exponent() && node.children.len() == 2;
        for (i, child) in node.children.iter().enumerate() {
            if skip_exponent && i == 1 {
                *next_id += child.len();
                continue;
            }
            total += count(child, next_id, options);
        }
        total
    }

    let mut next_id = 0;
    count(tree.root(), &mut next_id, options)
}

fn leaf_slots(id: NodeId, symbol: &Symbol, options: &WriteBackOptions) -> usize {
    let tunable = !options.excluded_nodes.contains(&id);
    let weights = options.include_variable_weights && tunable;
    match symbol {
        Symbol::Constant { .. } if tunable => 1,
        Symbol::Variable { .. } | Symbol::BinaryFactorVariable { .. } if weights => 1,
        Symbol::FactorVariable { weights: w, .. } if weights => w.len(),
        _ => 0,
    }
}

struct Walk<'a> {
    options: &'a WriteBackOptions,
    params: &'a [f64],
    next_param: usize,
    next_id: usize,
}

impl Walk<'_> {
    fn take(&mut self) -> f64 {
        let v = self.params[self.next_param];
        self.next_param += 1;
        v
    }

    fn node(&mut self, node: &mut TreeNode) {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let tunable = !self.options.excluded_nodes.contains(&id);
        let weights = self.options.include_variable_weights && tunable;

        match &mut node.symbol {
            Symbol::Constant { value } if tunable => *value = self.take(),
            Symbol::Variable { weight, .. } | Symbol::BinaryFactorVariable { weight, .. }
                if weights =>
            {
                *weight = self.take()
            }
            Symbol::FactorVariable { weights: w, .. } if weights => {
                for (_, value) in w.iter_mut() {
                    *value = self.take();
                }
            }
            _ => {}
        }

        let skip_exponent = node.symbol.has_exponent() && node.children.len() == 2;
        for (i, child) in node.children.iter_mut().enumerate() {
            if skip_exponent && i == 1 {
                self.next_id += child.len();
                continue;
            }
            self.node(child);
        }
    }
}
