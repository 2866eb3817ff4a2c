//! Serializer - packs a finished [`BPlusTree`] into one immutable buffer.
//!
//! Nodes are written in discovery order from the root, branches before
//! leaves. A child is referenced before it has a position, so each child
//! pointer is written as a zero placeholder plus a patch obligation; once
//! every node has been written the obligations are applied in a second
//! phase and the buffer is final.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::Write;

use tracing::debug;

use crate::common::config::{MAX_KEY_LEN, MAX_TREE_SECTION_LEN, MAX_VALUE_LEN};
use crate::common::{Error, NodeId, Result};
use crate::tree::{BPlusTree, Node};

use super::layout::{SlotTag, MAGIC, TREE_START};
use super::reader::DbReader;

/// A serialized tree: magic, tree section and value heap in one buffer.
///
/// # Example
/// ```
/// use rofldb::BPlusTree;
///
/// let mut tree = BPlusTree::new();
/// tree.insert("hello", "world");
///
/// let packed = tree.pack().unwrap();
/// assert!(packed.as_bytes().starts_with(b"ROFL\0\0"));
///
/// let reader = packed.reader().unwrap();
/// assert_eq!(reader.get("hello").unwrap(), Some(&b"world"[..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTree {
    bytes: Vec<u8>,
    node_count: usize,
    value_count: usize,
}

impl PackedTree {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total size of the file in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: even an empty tree packs to a header and a root record.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of node records in the tree section.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of entries in the value heap.
    #[inline]
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// CRC32 of the whole buffer.
    ///
    /// Packing the same tree twice gives the same fingerprint.
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.bytes)
    }

    /// Open a reader over this buffer.
    pub fn reader(&self) -> Result<DbReader<'_>> {
        DbReader::new(&self.bytes)
    }

    /// Write the buffer to `writer` in one sequential pass.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.bytes)?;
        Ok(())
    }
}

impl AsRef<[u8]> for PackedTree {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl BPlusTree {
    /// Serialize this tree. Shorthand for [`pack_tree`].
    pub fn pack(&self) -> Result<PackedTree> {
        pack_tree(self)
    }
}

/// Serialize a finished tree.
///
/// # Errors
/// - `Error::MultiValueNotSupported` if any key holds more than one value
/// - `Error::KeyTooLarge` / `Error::ValueTooLarge` for records that exceed
///   the slot or heap entry length fields
/// - `Error::TreeTooLarge` if the tree section outgrows 32-bit offsets
///
/// Nothing is returned on error; there is no partially written buffer.
pub fn pack_tree(tree: &BPlusTree) -> Result<PackedTree> {
    debug!(records = tree.len(), nodes = tree.node_count(), "packing tree");
    validate(tree)?;
    let packed = Serializer::new(tree).run()?;

    debug!(
        records = tree.len(),
        nodes = packed.node_count,
        values = packed.value_count,
        bytes = packed.len(),
        checksum = packed.checksum(),
        "packed tree"
    );
    Ok(packed)
}

/// Build a tree from a stream sorted by key and serialize it.
///
/// # Errors
/// Returns `Error::UnsortedInput` as soon as a key is not strictly greater
/// than its predecessor, plus everything [`pack_tree`] can return.
pub fn pack_sorted<I, K, V>(pairs: I, branching_factor: usize) -> Result<PackedTree>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    let mut tree = BPlusTree::with_branching_factor(branching_factor)?;
    let mut previous: Option<Vec<u8>> = None;

    for (key, value) in pairs {
        let key = key.into();
        if let Some(previous) = previous.take() {
            if key <= previous {
                return Err(Error::UnsortedInput {
                    previous,
                    current: key,
                });
            }
        }
        tree.insert(key.clone(), value);
        previous = Some(key);
    }

    pack_tree(&tree)
}

/// Reject anything the format cannot hold before a byte is written.
fn validate(tree: &BPlusTree) -> Result<()> {
    for (key, values) in tree.iter() {
        if key.len() > MAX_KEY_LEN {
            return Err(Error::KeyTooLarge(key.len()));
        }
        if values.len() != 1 {
            return Err(Error::MultiValueNotSupported {
                key: key.to_vec(),
                count: values.len(),
            });
        }
        if values[0].len() > MAX_VALUE_LEN {
            return Err(Error::ValueTooLarge(values[0].len()));
        }
    }
    Ok(())
}

// ============================================================================
// Patch buffer
// ============================================================================

/// Append-only byte buffer whose placeholders are filled in afterwards.
#[derive(Debug, Default)]
struct PatchBuffer {
    bytes: Vec<u8>,
}

impl PatchBuffer {
    #[inline]
    fn position(&self) -> usize {
        self.bytes.len()
    }

    fn put_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Write a zero u16 and return where it lives.
    fn reserve_u16(&mut self) -> usize {
        let at = self.position();
        self.put_u16(0);
        at
    }

    /// Write a zero u32 and return where it lives.
    fn reserve_u32(&mut self) -> usize {
        let at = self.position();
        self.put_u32(0);
        at
    }

    fn fill_u16(&mut self, at: usize, value: u16) {
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn fill_u32(&mut self, at: usize, value: u32) {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Fill a reserved u16 with the number of bytes written after it.
    fn close_u16(&mut self, at: usize) -> Result<()> {
        let len = self.position() - (at + 2);
        let len = u16::try_from(len).map_err(|_| Error::KeyTooLarge(len))?;
        self.fill_u16(at, len);
        Ok(())
    }

    /// Fill a reserved u32 with the number of bytes written after it.
    fn close_u32(&mut self, at: usize) -> Result<()> {
        let len = self.position() - (at + 4);
        let len = u32::try_from(len).map_err(|_| Error::TreeTooLarge(len))?;
        self.fill_u32(at, len);
        Ok(())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// Pending node in the pack queue.
///
/// Ordered by `(is_leaf, seq)`: branches first, then discovery order. The
/// sequence number is unique, so the order is total and the output is
/// reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PackEntry {
    is_leaf: bool,
    seq: u64,
    node: NodeId,
}

/// A child pointer placeholder waiting for its target's position.
#[derive(Debug, Clone, Copy)]
struct Patch {
    at: usize,
    target: NodeId,
}

struct Serializer<'a> {
    tree: &'a BPlusTree,
    out: PatchBuffer,
    heap: PatchBuffer,
    queue: BinaryHeap<Reverse<PackEntry>>,
    next_seq: u64,
    /// Offset of each written node from `TREE_START`, indexed by `NodeId`.
    positions: Vec<Option<u32>>,
    patches: Vec<Patch>,
    node_count: usize,
    value_count: usize,
}

impl<'a> Serializer<'a> {
    fn new(tree: &'a BPlusTree) -> Self {
        Self {
            tree,
            out: PatchBuffer::default(),
            heap: PatchBuffer::default(),
            queue: BinaryHeap::new(),
            next_seq: 0,
            positions: vec![None; tree.node_count()],
            patches: Vec::new(),
            node_count: 0,
            value_count: 0,
        }
    }

    fn run(mut self) -> Result<PackedTree> {
        self.out.put_bytes(MAGIC);
        let tree_len_at = self.out.reserve_u32();
        debug_assert_eq!(self.out.position(), TREE_START);

        // Write phase: the root is popped first and lands at TREE_START.
        self.enqueue(self.tree.root());
        while let Some(Reverse(entry)) = self.queue.pop() {
            self.write_node(entry.node)?;
        }

        // Patch phase: every child pointer gets its target's offset.
        for patch in std::mem::take(&mut self.patches) {
            let offset = self.positions[patch.target.0].ok_or_else(|| {
                Error::corrupt(format!("{} referenced but never written", patch.target))
            })?;
            self.out.fill_u32(patch.at, offset);
        }

        let tree_len = self.out.position() - TREE_START;
        if tree_len > MAX_TREE_SECTION_LEN {
            return Err(Error::TreeTooLarge(tree_len));
        }
        self.out.close_u32(tree_len_at)?;

        let heap = self.heap.into_bytes();
        self.out.put_u64(heap.len() as u64);
        self.out.put_bytes(&heap);

        Ok(PackedTree {
            bytes: self.out.into_bytes(),
            node_count: self.node_count,
            value_count: self.value_count,
        })
    }

    fn enqueue(&mut self, node: NodeId) {
        let entry = PackEntry {
            is_leaf: self.tree.node(node).is_leaf(),
            seq: self.next_seq,
            node,
        };
        self.next_seq += 1;
        self.queue.push(Reverse(entry));
    }

    fn write_node(&mut self, node_id: NodeId) -> Result<()> {
        let offset = self.out.position() - TREE_START;
        let offset = u32::try_from(offset).map_err(|_| Error::TreeTooLarge(offset))?;
        debug_assert!(self.positions[node_id.0].is_none(), "{} written twice", node_id);
        self.positions[node_id.0] = Some(offset);
        self.node_count += 1;

        let tree = self.tree;
        let record_len_at = self.out.reserve_u32();
        match tree.node(node_id) {
            Node::Branch(branch) => {
                for (index, &child) in branch.children.iter().enumerate() {
                    // the last child has no separator
                    let key = branch.keys.get(index).map_or(&[][..], Vec::as_slice);
                    self.write_child_slot(key, child)?;
                }
            }
            Node::Leaf(leaf) => {
                for (key, values) in leaf.keys.iter().zip(&leaf.values) {
                    self.write_value_slot(key, &values[0])?;
                }
            }
        }
        self.out.close_u32(record_len_at)
    }

    fn write_slot_key(&mut self, key: &[u8]) -> Result<usize> {
        let slot_len_at = self.out.reserve_u16();
        let key_len = u16::try_from(key.len()).map_err(|_| Error::KeyTooLarge(key.len()))?;
        self.out.put_u16(key_len);
        self.out.put_bytes(key);
        Ok(slot_len_at)
    }

    fn write_child_slot(&mut self, key: &[u8], child: NodeId) -> Result<()> {
        let slot_len_at = self.write_slot_key(key)?;
        self.out.put_u8(SlotTag::Child as u8);
        let at = self.out.reserve_u32();
        self.patches.push(Patch { at, target: child });
        self.enqueue(child);
        self.out.close_u16(slot_len_at)
    }

    fn write_value_slot(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let slot_len_at = self.write_slot_key(key)?;
        self.out.put_u8(SlotTag::Value as u8);
        self.out.put_u64(self.heap.position() as u64);

        let value_len =
            u32::try_from(value.len()).map_err(|_| Error::ValueTooLarge(value.len()))?;
        self.heap.put_u32(value_len);
        self.heap.put_bytes(value);
        self.value_count += 1;

        self.out.close_u16(slot_len_at)
    }
}

// ============================================================================
// TESTS
// ============================================================================
