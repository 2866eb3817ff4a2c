//! Leaf and branch nodes of the in-memory tree.
//!
//! Nodes live in the arena owned by [`BPlusTree`](super::BPlusTree) and
//! refer to each other through [`NodeId`] handles:
//! - `parent` is `None` only for the current root
//! - `previous` / `next` link nodes of the same level in key order

use crate::common::NodeId;

/// A leaf: sorted keys, each with its list of values.
///
/// Invariant: `keys` strictly increasing, `keys.len() == values.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafNode {
    pub keys: Vec<Vec<u8>>,
    /// One value list per key, in insertion order.
    pub values: Vec<Vec<Vec<u8>>>,
    pub parent: Option<NodeId>,
    pub previous: Option<NodeId>,
    pub next: Option<NodeId>,
}

impl LeafNode {
    /// Index of `key` in this leaf, or the position it would be inserted at.
    #[inline]
    pub fn search(&self, key: &[u8]) -> Result<usize, usize> {
        self.keys.binary_search_by(|probe| probe.as_slice().cmp(key))
    }

    /// Value list stored for `key`, if present.
    pub fn get(&self, key: &[u8]) -> Option<&[Vec<u8>]> {
        self.search(key).ok().map(|index| self.values[index].as_slice())
    }

    /// Number of keys in this leaf.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A branch: `k` separator keys routing to `k + 1` children.
///
/// `children[i]` holds keys in `[keys[i-1], keys[i])`, open at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchNode {
    pub keys: Vec<Vec<u8>>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub previous: Option<NodeId>,
    pub next: Option<NodeId>,
}

impl BranchNode {
    /// Index of the child whose range contains `key`.
    ///
    /// First index where `key < keys[i]`, else the last child.
    #[inline]
    pub fn child_index(&self, key: &[u8]) -> usize {
        self.keys.partition_point(|separator| separator.as_slice() <= key)
    }

    /// Child responsible for `key`.
    #[inline]
    pub fn child_for(&self, key: &[u8]) -> NodeId {
        self.children[self.child_index(key)]
    }

    /// Number of children.
    #[inline]
    pub fn degree(&self) -> usize {
        self.children.len()
    }
}

/// A node in the tree arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Branch(BranchNode),
}

impl Node {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Separator keys of a branch, or record keys of a leaf.
    pub fn keys(&self) -> &[Vec<u8>] {
        match self {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Branch(branch) => &branch.keys,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Branch(branch) => branch.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Branch(branch) => branch.parent = parent,
        }
    }

    pub fn previous(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.previous,
            Node::Branch(branch) => branch.previous,
        }
    }

    pub fn next(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.next,
            Node::Branch(branch) => branch.next,
        }
    }

    pub(crate) fn set_previous(&mut self, previous: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.previous = previous,
            Node::Branch(branch) => branch.previous = previous,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&BranchNode> {
        match self {
            Node::Branch(branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }
}
