//! Node identifier type.

use std::fmt;

/// Identifies a node in the in-memory tree's arena.
///
/// Parent and sibling links are stored as `Option<NodeId>` instead of
/// references, so the parent/child/sibling graph has no ownership cycles.
/// Using `usize` allows direct indexing: `nodes[node_id.0]`.
///
/// # Example
/// ```
/// use rofldb::NodeId;
///
/// let node_id = NodeId::new(5);
/// assert_eq!(node_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Create a new NodeId.
    #[inline]
    pub fn new(id: usize) -> Self {
        NodeId(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}
