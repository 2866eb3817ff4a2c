//! In-memory B+Tree.
//!
//! This module contains:
//! - [`BPlusTree`] - The mutable tree handle (insert, get, range queries)
//! - [`Node`] / [`LeafNode`] / [`BranchNode`] - Arena-allocated nodes
//! - [`CompareOp`] - Operators accepted by range queries

mod bplus_tree;
mod compare_op;
mod node;

pub use bplus_tree::{BPlusTree, Iter};
pub use compare_op::CompareOp;
pub use node::{BranchNode, LeafNode, Node};
