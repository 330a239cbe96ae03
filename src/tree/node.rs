//! Symbolic expression tree storage.
//!
//! ## Purpose
//!
//! This module provides the minimal tree type the optimizer works on: an
//! ordered rooted tree of [`TreeNode`]s with structural cloning, prefix
//! traversal and in-place leaf mutation.
//!
//! ## Design notes
//!
//! * **Owned children**: Each node owns its children; `Clone` is a deep
//!   structural copy.
//! * **Prefix identity**: A [`NodeId`] is the position of a node in prefix
//!   (pre-order) traversal. Clones share identities, so sets of node ids
//!   computed on the original tree remain valid on the clone.
//!
//! ## Invariants
//!
//! * `NodeId(0)` is the root.
//! * Prefix order visits a node before its children, children left to right.
//!
//! ## Non-goals
//!
//! * Tree creation, mutation of shape, and grammar enforcement belong to the
//!   genetic-programming search.
//! * Persistence or serialization of trees.

use crate::tree::symbol::Symbol;

/// Position of a node in prefix traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A node and its ordered subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Node kind and, for terminals, its values.
    pub symbol: Symbol,

    /// Ordered subtrees.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a node with the given children.
    pub fn new(symbol: Symbol, children: Vec<TreeNode>) -> Self {
        Self { symbol, children }
    }

    /// Create a leaf node.
    pub fn leaf(symbol: Symbol) -> Self {
        Self::new(symbol, Vec::new())
    }

    /// Tunable constant leaf.
    pub fn constant(value: f64) -> Self {
        Self::leaf(Symbol::Constant { value })
    }

    /// Non-tunable literal leaf.
    pub fn fixed(value: f64) -> Self {
        Self::leaf(Symbol::FixedConstant { value })
    }

    /// Variable leaf with a weight.
    pub fn variable(name: impl Into<String>, weight: f64) -> Self {
        Self::leaf(Symbol::Variable {
            name: name.into(),
            weight,
            lag: 0,
            index: None,
        })
    }

    /// Variable leaf reading `lag` rows away from the current row.
    pub fn lagged_variable(name: impl Into<String>, weight: f64, lag: i32) -> Self {
        Self::leaf(Symbol::Variable {
            name: name.into(),
            weight,
            lag,
            index: None,
        })
    }

    /// Variable leaf reading one element of a vector-valued column.
    pub fn vector_element(name: impl Into<String>, weight: f64, index: usize) -> Self {
        Self::leaf(Symbol::Variable {
            name: name.into(),
            weight,
            lag: 0,
            index: Some(index),
        })
    }

    /// Binary factor (one-category indicator) leaf.
    pub fn binary_factor(name: impl Into<String>, category: impl Into<String>, weight: f64) -> Self {
        Self::leaf(Symbol::BinaryFactorVariable {
            name: name.into(),
            category: category.into(),
            weight,
        })
    }

    /// Multi-category factor leaf.
    pub fn factor<S: Into<String>>(name: impl Into<String>, weights: Vec<(S, f64)>) -> Self {
        Self::leaf(Symbol::FactorVariable {
            name: name.into(),
            weights: weights.into_iter().map(|(c, w)| (c.into(), w)).collect(),
        })
    }

    /// Operator node.
    pub fn op(symbol: Symbol, children: Vec<TreeNode>) -> Self {
        Self::new(symbol, children)
    }

    /// Number of nodes in this subtree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::len).sum::<usize>()
    }

    /// Always false; a subtree contains at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Prefix-order iterator over this subtree, yielding `(offset, node)` where
    /// `offset` is relative to this node.
    pub fn prefix(&self) -> PrefixIter<'_> {
        PrefixIter {
            stack: vec![self],
            next_id: 0,
        }
    }
}

/// Prefix-order iterator over a subtree.
#[derive(Debug)]
pub struct PrefixIter<'a> {
    stack: Vec<&'a TreeNode>,
    next_id: usize,
}

impl<'a> Iterator for PrefixIter<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Some((id, node))
    }
}

/// A complete symbolic expression (one GP individual).
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicExpressionTree {
    root: TreeNode,
}

impl SymbolicExpressionTree {
    /// Wrap an expression in a tree.
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    /// Wrap an expression under a `ProgramRoot` node.
    pub fn with_program_root(expression: TreeNode) -> Self {
        Self::new(TreeNode::op(Symbol::ProgramRoot, vec![expression]))
    }

    /// Root node.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Mutable root node.
    pub fn root_mut(&mut self) -> &mut TreeNode {
        &mut self.root
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Always false; a tree contains at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Prefix-order iterator over all nodes.
    pub fn nodes(&self) -> PrefixIter<'_> {
        self.root.prefix()
    }

    /// Node at a prefix position.
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes().nth(id.0).map(|(_, node)| node)
    }

    /// Mutable node at a prefix position.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        fn descend<'a>(
            node: &'a mut TreeNode,
            target: usize,
            next: &mut usize,
        ) -> Option<&'a mut TreeNode> {
            if *next == target {
                return Some(node);
            }
            *next += 1;
            for child in node.children.iter_mut() {
                let size = child.len();
                if target < *next + size {
                    return descend(child, target, next);
                }
                *next += size;
            }
            None
        }

        let mut next = 0;
        descend(&mut self.root, id.0, &mut next)
    }

    /// Numeric payloads of all terminals in prefix order.
    pub fn leaf_values(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for (_, node) in self.nodes() {
            match &node.symbol {
                Symbol::Constant { value } | Symbol::FixedConstant { value } => out.push(*value),
                Symbol::Variable { weight, .. } | Symbol::BinaryFactorVariable { weight, .. } => {
                    out.push(*weight)
                }
                Symbol::FactorVariable { weights, .. } => {
                    out.extend(weights.iter().map(|(_, w)| *w))
                }
                _ => {}
            }
        }
        out
    }
}
