//! The mutable in-memory B+Tree.
//!
//! Records are inserted one at a time; overflowing nodes split and push a
//! separator into their parent, growing a new root when the split reaches
//! the top. Nodes are never removed.

use tracing::trace;

use crate::common::config::{DEFAULT_BRANCHING_FACTOR, MIN_BRANCHING_FACTOR};
use crate::common::{Error, NodeId, Result};

use super::compare_op::CompareOp;
use super::node::{BranchNode, LeafNode, Node};

/// A B+Tree over byte-string keys, each key mapping to a list of values.
///
/// # Structure
/// ```text
///                 ┌──────────────┐
///                 │ Branch [k2]  │  root
///                 └──────┬───────┘
///             ┌──────────┴──────────┐
///      ┌──────▼──────┐       ┌──────▼──────┐
///      │ Leaf k0 k1  │◀─────▶│ Leaf k2 k3  │  leaf chain
///      └─────────────┘       └─────────────┘
/// ```
///
/// All nodes live in an arena (`Vec<Node>`) addressed by [`NodeId`]; parent
/// and sibling links are plain handles.
///
/// # Splits
/// - A leaf holding more than `b` keys splits at `ceil(b/2)`; the right
///   leaf's first key is *copied* into the parent.
/// - A branch holding more than `b` children splits at `floor(b/2)`; the
///   separator at that index is *moved* into the parent.
///
/// # Example
/// ```
/// use rofldb::BPlusTree;
///
/// let mut tree = BPlusTree::with_branching_factor(3).unwrap();
/// for i in 0..4 {
///     tree.insert(format!("key{i}"), format!("value{i}"));
/// }
///
/// assert_eq!(tree.height(), 1);
/// let below: Vec<&[u8]> = tree.search("<", "key2").unwrap();
/// assert_eq!(below, [b"value0", b"value1"]);
/// ```
#[derive(Debug, Clone)]
pub struct BPlusTree {
    /// Node arena. Index `i` holds `NodeId(i)`.
    nodes: Vec<Node>,

    /// Current top of the tree.
    root: NodeId,

    /// Number of `insert` calls, duplicates included.
    len: usize,

    /// Maximum keys per leaf / children per branch.
    branching_factor: usize,
}

impl BPlusTree {
    /// Create an empty tree with [`DEFAULT_BRANCHING_FACTOR`].
    pub fn new() -> Self {
        Self::build(DEFAULT_BRANCHING_FACTOR)
    }

    /// Create an empty tree with the given branching factor.
    ///
    /// # Errors
    /// Returns `Error::InvalidBranchingFactor` if `branching_factor` is below
    /// [`MIN_BRANCHING_FACTOR`].
    pub fn with_branching_factor(branching_factor: usize) -> Result<Self> {
        if branching_factor < MIN_BRANCHING_FACTOR {
            return Err(Error::InvalidBranchingFactor(branching_factor));
        }
        Ok(Self::build(branching_factor))
    }

    fn build(branching_factor: usize) -> Self {
        Self {
            nodes: vec![Node::Leaf(LeafNode::default())],
            root: NodeId::new(0),
            len: 0,
            branching_factor,
        }
    }

    // ========================================================================
    // Public API: Accessors
    // ========================================================================

    /// Number of records inserted, counting duplicate keys once per insert.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn branching_factor(&self) -> usize {
        self.branching_factor
    }

    /// Minimum occupancy `ceil(b/2)`.
    ///
    /// Reported for information only: the tree never deletes, so nodes are
    /// not rebalanced up to this bound.
    #[inline]
    pub fn min_occupancy(&self) -> usize {
        self.branching_factor.div_ceil(2)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node in the arena.
    ///
    /// # Panics
    /// Panics if `node_id` was not handed out by this tree.
    #[inline]
    pub fn node(&self, node_id: NodeId) -> &Node {
        &self.nodes[node_id.0]
    }

    /// Total number of nodes, leaves and branches.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of branch levels above the leaves (a lone root leaf is 0).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node_id = self.root;
        while let Node::Branch(branch) = self.node(node_id) {
            node_id = branch.children[0];
            height += 1;
        }
        height
    }

    /// Leftmost leaf, the head of the leaf chain.
    pub fn first_leaf(&self) -> NodeId {
        let mut node_id = self.root;
        while let Node::Branch(branch) = self.node(node_id) {
            node_id = branch.children[0];
        }
        node_id
    }

    /// Node ids level by level, root first, each level in sibling order.
    pub fn levels(&self) -> Vec<Vec<NodeId>> {
        let mut levels = Vec::new();
        let mut head = Some(self.root);
        while let Some(first) = head {
            let mut level = Vec::new();
            let mut cursor = Some(first);
            while let Some(node_id) = cursor {
                level.push(node_id);
                cursor = self.node(node_id).next();
            }
            levels.push(level);
            head = self.node(first).as_branch().map(|branch| branch.children[0]);
        }
        levels
    }

    // ========================================================================
    // Public API: Insert
    // ========================================================================

    /// Insert a record.
    ///
    /// An existing key gets `value` appended to its value list; a new key is
    /// placed at its sorted position. Splits propagate upward as needed and
    /// the root handle is refreshed afterwards.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        let leaf_id = self.find_leaf(&key);
        let branching_factor = self.branching_factor;

        let overflow = {
            let leaf = self.leaf_mut(leaf_id);
            match leaf.search(&key) {
                Ok(index) => {
                    leaf.values[index].push(value);
                    false
                }
                Err(index) => {
                    leaf.keys.insert(index, key);
                    leaf.values.insert(index, vec![value]);
                    leaf.len() > branching_factor
                }
            }
        };

        if overflow {
            self.split_leaf(leaf_id);
        }

        self.len += 1;
        self.refresh_root();
    }

    // ========================================================================
    // Public API: Lookup
    // ========================================================================

    /// Value list for `key`, or `None` if the key was never inserted.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&[Vec<u8>]> {
        let key = key.as_ref();
        self.leaf(self.find_leaf(key)).get(key)
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.get(key).is_some()
    }

    /// Values of all records whose key satisfies `record_key <op> key`.
    ///
    /// `op` is one of `<`, `<=`, `>`, `>=`, `==`, `!=`, optionally padded
    /// with whitespace.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedOperator` for any other symbol.
    pub fn search(&self, op: &str, key: impl AsRef<[u8]>) -> Result<Vec<&[u8]>> {
        let op: CompareOp = op.parse()?;
        Ok(self.range(op, key))
    }

    /// Values of all records whose key satisfies `record_key <op> key`.
    ///
    /// Values come out in key order, and in insertion order within a key.
    /// Ordered operators cost O(log n + m): one descent, then a walk along
    /// the leaf chain.
    pub fn range(&self, op: CompareOp, key: impl AsRef<[u8]>) -> Vec<&[u8]> {
        let key = key.as_ref();
        match op {
            CompareOp::Equal => {
                let mut out = Vec::new();
                if let Some(values) = self.get(key) {
                    out.extend(values.iter().map(Vec::as_slice));
                }
                out
            }
            CompareOp::NotEqual => {
                let mut out = self.scan_left(key, false);
                out.extend(self.scan_right(key, false));
                out
            }
            CompareOp::Less => self.scan_left(key, false),
            CompareOp::LessOrEqual => self.scan_left(key, true),
            CompareOp::Greater => self.scan_right(key, false),
            CompareOp::GreaterOrEqual => self.scan_right(key, true),
        }
    }

    // ========================================================================
    // Public API: Iteration
    // ========================================================================

    /// All `(key, values)` pairs in key order, following the leaf chain.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            tree: self,
            leaf: self.node(self.first_leaf()).as_leaf(),
            index: 0,
        }
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// All values in key order, flattening each key's value list.
    pub fn values(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.iter()
            .flat_map(|(_, values)| values.iter().map(Vec::as_slice))
    }

    // ========================================================================
    // Internal: Navigation
    // ========================================================================

    fn find_leaf(&self, key: &[u8]) -> NodeId {
        let mut node_id = self.root;
        while let Node::Branch(branch) = self.node(node_id) {
            node_id = branch.child_for(key);
        }
        node_id
    }

    fn leaf(&self, node_id: NodeId) -> &LeafNode {
        match self.node(node_id) {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => unreachable!("{} is a branch, expected a leaf", node_id),
        }
    }

    fn leaf_mut(&mut self, node_id: NodeId) -> &mut LeafNode {
        match &mut self.nodes[node_id.0] {
            Node::Leaf(leaf) => leaf,
            Node::Branch(_) => unreachable!("{} is a branch, expected a leaf", node_id),
        }
    }

    fn branch_mut(&mut self, node_id: NodeId) -> &mut BranchNode {
        match &mut self.nodes[node_id.0] {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => unreachable!("{} is a leaf, expected a branch", node_id),
        }
    }

    /// Walk parent links up from the old root after a possible root split.
    fn refresh_root(&mut self) {
        while let Some(parent) = self.node(self.root).parent() {
            self.root = parent;
        }
    }

    // ========================================================================
    // Internal: Range scans
    // ========================================================================

    /// Values of records below `key` (or up to it when `inclusive`).
    fn scan_left(&self, key: &[u8], inclusive: bool) -> Vec<&[u8]> {
        let leaf_id = self.find_leaf(key);
        let leaf = self.leaf(leaf_id);
        let end = if inclusive {
            leaf.keys.partition_point(|k| k.as_slice() <= key)
        } else {
            leaf.keys.partition_point(|k| k.as_slice() < key)
        };

        let mut preceding = Vec::new();
        let mut cursor = leaf.previous;
        while let Some(node_id) = cursor {
            preceding.push(node_id);
            cursor = self.node(node_id).previous();
        }

        let mut out = Vec::new();
        for &node_id in preceding.iter().rev() {
            push_values(&mut out, &self.leaf(node_id).values);
        }
        push_values(&mut out, &leaf.values[..end]);
        out
    }

    /// Values of records above `key` (or from it when `inclusive`).
    fn scan_right(&self, key: &[u8], inclusive: bool) -> Vec<&[u8]> {
        let leaf = self.leaf(self.find_leaf(key));
        let start = if inclusive {
            leaf.keys.partition_point(|k| k.as_slice() < key)
        } else {
            leaf.keys.partition_point(|k| k.as_slice() <= key)
        };

        let mut out = Vec::new();
        push_values(&mut out, &leaf.values[start..]);
        let mut cursor = leaf.next;
        while let Some(node_id) = cursor {
            let next_leaf = self.leaf(node_id);
            push_values(&mut out, &next_leaf.values);
            cursor = next_leaf.next;
        }
        out
    }

    // ========================================================================
    // Internal: Splits
    // ========================================================================

    fn split_leaf(&mut self, leaf_id: NodeId) {
        let split_at = self.branching_factor.div_ceil(2);
        let right_id = NodeId::new(self.nodes.len());

        let right = {
            let leaf = self.leaf_mut(leaf_id);
            let right = LeafNode {
                keys: leaf.keys.split_off(split_at),
                values: leaf.values.split_off(split_at),
                parent: leaf.parent,
                previous: Some(leaf_id),
                next: leaf.next,
            };
            leaf.next = Some(right_id);
            right
        };

        let separator = right.keys[0].clone();
        let parent = right.parent;
        if let Some(old_next) = right.next {
            self.nodes[old_next.0].set_previous(Some(right_id));
        }
        self.nodes.push(Node::Leaf(right));

        trace!(left = %leaf_id, right = %right_id, "split leaf");
        self.promote(leaf_id, separator, right_id, parent);
    }

    fn split_branch(&mut self, branch_id: NodeId) {
        let split_at = self.branching_factor / 2;
        let right_id = NodeId::new(self.nodes.len());

        let (right, separator) = {
            let branch = self.branch_mut(branch_id);
            let mut right_keys = branch.keys.split_off(split_at);
            let separator = right_keys.remove(0);
            let right = BranchNode {
                keys: right_keys,
                children: branch.children.split_off(split_at + 1),
                parent: branch.parent,
                previous: Some(branch_id),
                next: branch.next,
            };
            branch.next = Some(right_id);
            (right, separator)
        };

        for &child in &right.children {
            self.nodes[child.0].set_parent(Some(right_id));
        }
        let parent = right.parent;
        if let Some(old_next) = right.next {
            self.nodes[old_next.0].set_previous(Some(right_id));
        }
        self.nodes.push(Node::Branch(right));

        trace!(left = %branch_id, right = %right_id, "split branch");
        self.promote(branch_id, separator, right_id, parent);
    }

    /// Hand a separator to the parent of a freshly split pair.
    fn promote(&mut self, left: NodeId, separator: Vec<u8>, right: NodeId, parent: Option<NodeId>) {
        match parent {
            Some(parent) => self.add_child(parent, separator, right),
            None => {
                let root_id = NodeId::new(self.nodes.len());
                self.nodes.push(Node::Branch(BranchNode {
                    keys: vec![separator],
                    children: vec![left, right],
                    ..BranchNode::default()
                }));
                self.nodes[left.0].set_parent(Some(root_id));
                self.nodes[right.0].set_parent(Some(root_id));
                trace!(root = %root_id, "grew new root");
            }
        }
    }

    fn add_child(&mut self, branch_id: NodeId, key: Vec<u8>, child: NodeId) {
        self.nodes[child.0].set_parent(Some(branch_id));
        let branching_factor = self.branching_factor;

        let overflow = {
            let branch = self.branch_mut(branch_id);
            let index = branch.child_index(&key);
            branch.keys.insert(index, key);
            branch.children.insert(index + 1, child);
            branch.degree() > branching_factor
        };

        if overflow {
            self.split_branch(branch_id);
        }
    }
}

impl Default for BPlusTree {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Extend<(K, V)> for BPlusTree
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for BPlusTree
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<'a> IntoIterator for &'a BPlusTree {
    type Item = (&'a [u8], &'a [Vec<u8>]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(key, values)` pairs in key order.
///
/// Created by [`BPlusTree::iter`].
pub struct Iter<'a> {
    tree: &'a BPlusTree,
    leaf: Option<&'a LeafNode>,
    index: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [Vec<u8>]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf?;
            if self.index < leaf.len() {
                let index = self.index;
                self.index += 1;
                return Some((leaf.keys[index].as_slice(), leaf.values[index].as_slice()));
            }
            self.leaf = leaf.next.and_then(|next| self.tree.node(next).as_leaf());
            self.index = 0;
        }
    }
}

fn push_values<'a>(out: &mut Vec<&'a [u8]>, lists: &'a [Vec<Vec<u8>>]) {
    out.extend(lists.iter().flatten().map(Vec::as_slice));
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: usize) -> String {
        format!("key{:04}", i)
    }

    fn value(i: usize) -> String {
        format!("value{:04}", i)
    }

    fn strings(values: Vec<&[u8]>) -> Vec<String> {
        values
            .into_iter()
            .map(|v| String::from_utf8(v.to_vec()).unwrap())
            .collect()
    }

    fn sample_tree() -> BPlusTree {
        let mut tree = BPlusTree::with_branching_factor(3).unwrap();
        for i in 0..4 {
            tree.insert(format!("key{i}"), format!("value{i}"));
        }
        tree
    }

    /// Check parent links, sibling links and key ordering of every node.
    fn assert_structure(tree: &BPlusTree) {
        assert_eq!(tree.node(tree.root()).parent(), None);

        for (depth, level) in tree.levels().iter().enumerate() {
            assert_eq!(tree.node(level[0]).previous(), None, "level {depth} head");
            for pair in level.windows(2) {
                assert_eq!(tree.node(pair[1]).previous(), Some(pair[0]));
            }
            for &node_id in level {
                let node = tree.node(node_id);
                assert!(node.keys().windows(2).all(|w| w[0] < w[1]));
                if let Node::Branch(branch) = node {
                    assert_eq!(branch.children.len(), branch.keys.len() + 1);
                    assert!(branch.children.len() <= tree.branching_factor());
                    for &child in &branch.children {
                        assert_eq!(tree.node(child).parent(), Some(node_id));
                    }
                } else {
                    assert!(node.keys().len() <= tree.branching_factor());
                }
            }
        }
    }

    // --- Construction ---

    #[test]
    fn test_new_tree_is_single_leaf() {
        let tree = BPlusTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.branching_factor(), DEFAULT_BRANCHING_FACTOR);
        assert!(tree.node(tree.root()).is_leaf());
    }

    #[test]
    fn test_invalid_branching_factor() {
        assert!(matches!(
            BPlusTree::with_branching_factor(2),
            Err(Error::InvalidBranchingFactor(2))
        ));
        assert!(BPlusTree::with_branching_factor(MIN_BRANCHING_FACTOR).is_ok());
    }

    #[test]
    fn test_min_occupancy() {
        assert_eq!(BPlusTree::with_branching_factor(3).unwrap().min_occupancy(), 2);
        assert_eq!(BPlusTree::with_branching_factor(4).unwrap().min_occupancy(), 2);
        assert_eq!(BPlusTree::new().min_occupancy(), 16);
    }

    // --- Insert and get ---

    #[test]
    fn test_insert_and_get() {
        let mut tree = BPlusTree::new();
        tree.insert("b", "2");
        tree.insert("a", "1");

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("a"), Some(&[b"1".to_vec()][..]));
        assert_eq!(tree.get("b"), Some(&[b"2".to_vec()][..]));
        assert_eq!(tree.get("c"), None);
        assert!(tree.contains_key("a"));
    }

    #[test]
    fn test_duplicate_key_appends_value() {
        let mut tree = BPlusTree::with_branching_factor(3).unwrap();
        tree.insert("k", "first");
        tree.insert("k", "second");

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.keys().count(), 1);
        assert_eq!(
            tree.get("k").unwrap(),
            &[b"first".to_vec(), b"second".to_vec()][..]
        );
    }

    #[test]
    fn test_duplicates_do_not_split() {
        let mut tree = BPlusTree::with_branching_factor(3).unwrap();
        for _ in 0..10 {
            tree.insert("same", "v");
        }
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.get("same").unwrap().len(), 10);
    }

    // --- Splits ---

    #[test]
    fn test_four_keys_make_one_branch_two_leaves() {
        let tree = sample_tree();

        assert_eq!(tree.height(), 1);
        assert_eq!(tree.node_count(), 3);

        let root = tree.node(tree.root()).as_branch().unwrap();
        assert_eq!(root.keys, vec![b"key2".to_vec()]);

        let left = tree.node(root.children[0]).as_leaf().unwrap();
        let right = tree.node(root.children[1]).as_leaf().unwrap();
        assert_eq!(left.keys, vec![b"key0".to_vec(), b"key1".to_vec()]);
        assert_eq!(right.keys, vec![b"key2".to_vec(), b"key3".to_vec()]);
        assert_eq!(left.next, Some(root.children[1]));
        assert_eq!(right.previous, Some(root.children[0]));
    }

    #[test]
    fn test_leaf_split_copies_separator() {
        let mut tree = BPlusTree::with_branching_factor(4).unwrap();
        for i in 0..5 {
            tree.insert(key(i), value(i));
        }

        let root = tree.node(tree.root()).as_branch().unwrap();
        let left = tree.node(root.children[0]).as_leaf().unwrap();
        let right = tree.node(root.children[1]).as_leaf().unwrap();

        // ceil(4/2) = 2 keys stay left
        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 3);
        assert!(left.keys.last().unwrap() < &right.keys[0]);
        assert_eq!(root.keys[0], right.keys[0]);
    }

    #[test]
    fn test_branch_split_moves_separator() {
        let mut tree = BPlusTree::with_branching_factor(3).unwrap();
        for i in 0..10 {
            tree.insert(key(i), value(i));
        }
        assert!(tree.height() >= 2);

        // A separator moved up from a branch does not stay in that branch.
        for level in tree.levels() {
            for node_id in level {
                if let Node::Branch(branch) = tree.node(node_id) {
                    if let Some(parent) = branch.parent {
                        let parent_keys = tree.node(parent).keys();
                        for k in &branch.keys {
                            assert!(!parent_keys.contains(k));
                        }
                    }
                }
            }
        }
        assert_structure(&tree);
    }

    #[test]
    fn test_root_changes_on_growth() {
        let mut tree = BPlusTree::with_branching_factor(3).unwrap();
        let original_root = tree.root();
        for i in 0..3 {
            tree.insert(key(i), value(i));
        }
        assert_eq!(tree.root(), original_root);

        tree.insert(key(3), value(3));
        assert_ne!(tree.root(), original_root);
        assert_eq!(tree.node(original_root).parent(), Some(tree.root()));
    }

    #[test]
    fn test_structure_ascending_descending_interleaved() {
        for b in [3, 4, 5, 8] {
            let mut ascending = BPlusTree::with_branching_factor(b).unwrap();
            let mut descending = BPlusTree::with_branching_factor(b).unwrap();
            let mut interleaved = BPlusTree::with_branching_factor(b).unwrap();
            for i in 0..200 {
                ascending.insert(key(i), value(i));
                descending.insert(key(199 - i), value(199 - i));
                interleaved.insert(key((i * 37) % 200), value((i * 37) % 200));
            }

            for tree in [&ascending, &descending, &interleaved] {
                assert_structure(tree);
                assert_eq!(tree.len(), 200);
                let keys: Vec<&[u8]> = tree.keys().collect();
                let expected: Vec<String> = (0..200).map(key).collect();
                assert_eq!(keys, expected.iter().map(|k| k.as_bytes()).collect::<Vec<_>>());
                for i in 0..200 {
                    assert_eq!(tree.get(key(i)).unwrap(), &[value(i).into_bytes()][..]);
                }
            }
        }
    }

    // --- Range queries ---

    #[test]
    fn test_search_scenario() {
        let tree = sample_tree();

        assert_eq!(
            strings(tree.search("<", "key2").unwrap()),
            vec!["value0", "value1"]
        );
        assert_eq!(
            strings(tree.search(">=", "key2").unwrap()),
            vec!["value2", "value3"]
        );
        assert_eq!(
            strings(tree.search("<=", "key2").unwrap()),
            vec!["value0", "value1", "value2"]
        );
        assert_eq!(
            strings(tree.search(">", "key2").unwrap()),
            vec!["value3"]
        );
        assert_eq!(
            strings(tree.search("==", "key1").unwrap()),
            vec!["value1"]
        );
        assert_eq!(
            strings(tree.search("!=", "key1").unwrap()),
            vec!["value0", "value2", "value3"]
        );
    }

    #[test]
    fn test_search_absent_probe() {
        let tree = sample_tree();

        assert!(tree.search("==", "nope").unwrap().is_empty());
        assert_eq!(tree.search("!=", "key15").unwrap().len(), 4);
        // "key15" sorts between key1 and key2
        assert_eq!(
            strings(tree.search("<", "key15").unwrap()),
            vec!["value0", "value1"]
        );
        assert_eq!(
            strings(tree.search(">", "key15").unwrap()),
            vec!["value2", "value3"]
        );
    }

    #[test]
    fn test_search_beyond_all_keys() {
        let tree = sample_tree();

        assert!(tree.search(">", "zzz").unwrap().is_empty());
        assert!(tree.search(">=", "zzz").unwrap().is_empty());
        assert_eq!(tree.search("<", "zzz").unwrap().len(), 4);
        assert_eq!(tree.search("<=", "zzz").unwrap().len(), 4);
    }

    #[test]
    fn test_search_before_all_keys() {
        let tree = sample_tree();

        assert!(tree.search("<", "a").unwrap().is_empty());
        assert!(tree.search("<=", "a").unwrap().is_empty());
        assert_eq!(tree.search(">", "a").unwrap().len(), 4);
    }

    #[test]
    fn test_search_unsupported_operator() {
        let tree = sample_tree();
        assert!(matches!(
            tree.search("=>", "key1"),
            Err(Error::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_search_on_empty_tree() {
        let tree = BPlusTree::new();
        for op in CompareOp::ALL {
            assert!(tree.range(op, "x").is_empty());
        }
    }

    #[test]
    fn test_range_includes_duplicate_values() {
        let mut tree = BPlusTree::with_branching_factor(3).unwrap();
        tree.insert("a", "a1");
        tree.insert("b", "b1");
        tree.insert("a", "a2");

        assert_eq!(
            strings(tree.range(CompareOp::LessOrEqual, "b")),
            vec!["a1", "a2", "b1"]
        );
    }

    #[test]
    fn test_range_matches_filter_on_large_tree() {
        let mut tree = BPlusTree::with_branching_factor(4).unwrap();
        for i in (0..300).rev() {
            tree.insert(key(i * 2), value(i * 2));
        }

        for probe in [0, 1, 2, 151, 300, 598, 599, 700] {
            let probe_key = key(probe);
            for op in CompareOp::ALL {
                let expected: Vec<Vec<u8>> = (0..300)
                    .map(|i| i * 2)
                    .filter(|&i| op.matches(key(i).as_bytes(), probe_key.as_bytes()))
                    .map(|i| value(i).into_bytes())
                    .collect();
                let got: Vec<Vec<u8>> =
                    tree.range(op, &probe_key).into_iter().map(<[u8]>::to_vec).collect();
                assert_eq!(got, expected, "{} {}", op, probe_key);
            }
        }
    }

    // --- Iteration ---

    #[test]
    fn test_iter_and_values() {
        let tree = sample_tree();
        let pairs: Vec<(&[u8], usize)> = tree.iter().map(|(k, v)| (k, v.len())).collect();
        assert_eq!(
            pairs,
            vec![
                (&b"key0"[..], 1),
                (&b"key1"[..], 1),
                (&b"key2"[..], 1),
                (&b"key3"[..], 1)
            ]
        );
        assert_eq!(tree.values().count(), 4);
        assert_eq!((&tree).into_iter().count(), 4);
    }

    #[test]
    fn test_from_iterator() {
        let tree: BPlusTree = (0..100).map(|i| (key(i), value(i))).collect();
        assert_eq!(tree.len(), 100);
        assert_eq!(tree.get(key(42)).unwrap(), &[value(42).into_bytes()][..]);
    }

    #[test]
    fn test_levels() {
        let tree = sample_tree();
        let levels = tree.levels();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], vec![tree.root()]);
        assert_eq!(levels[1].len(), 2);
        assert_eq!(levels[1][0], tree.first_leaf());
    }
}
