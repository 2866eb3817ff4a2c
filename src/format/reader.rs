//! DbReader - lookups straight out of a serialized buffer.
//!
//! The reader borrows the file bytes and parses node records on demand;
//! nothing is deserialized up front and the buffer is never modified, so a
//! single reader can be shared by any number of threads.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use crate::common::{Error, Result};

use super::layout::{
    read_bytes, read_u16, read_u32, read_u64, SlotTag, HEAP_LEN_SIZE, KEY_LEN_SIZE, MAGIC,
    MIN_FILE_LEN, OFFSET_TREE_LEN, RECORD_LEN_SIZE, SLOT_LEN_SIZE, TAG_SIZE, TREE_START,
    VALUE_LEN_SIZE,
};
use super::stats::ReaderStats;

/// Where a slot points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLink {
    /// Offset of a heap entry.
    Value(u64),
    /// Offset of a node record, relative to the tree section start.
    Child(u32),
}

/// One `(key, link)` pair of a node record.
///
/// In a branch an empty key marks the last child, which has no upper
/// bound. In a leaf the key is the record key as inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<'a> {
    pub key: &'a [u8],
    pub link: SlotLink,
}

impl Slot<'_> {
    /// Whether a lookup for `probe` descends into this child slot.
    ///
    /// Same rule as the in-memory tree: the first slot whose key is absent
    /// or strictly greater than the probe.
    #[inline]
    fn routes(&self, probe: &[u8]) -> bool {
        self.key.is_empty() || probe < self.key
    }
}

/// A node record inside the tree section.
#[derive(Debug, Clone, Copy)]
pub struct NodeRecord<'a> {
    offset: u32,
    body: &'a [u8],
}

impl<'a> NodeRecord<'a> {
    /// Offset of this record from the tree section start.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Bytes taken by this record, length prefix included.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        RECORD_LEN_SIZE + self.body.len()
    }

    pub fn slots(&self) -> Slots<'a> {
        Slots {
            body: self.body,
            pos: 0,
        }
    }

    /// A node is a leaf iff none of its slots is a child pointer.
    pub fn is_leaf(&self) -> Result<bool> {
        for slot in self.slots() {
            if let SlotLink::Child(_) = slot?.link {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Iterator over the slots of a [`NodeRecord`].
///
/// Yields an error and stops at the first malformed slot.
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> Slots<'a> {
    fn parse_next(&mut self) -> Result<Slot<'a>> {
        let slot_len = read_u16(self.body, self.pos, "slot length")? as usize;
        let slot = read_bytes(self.body, self.pos + SLOT_LEN_SIZE, slot_len, "slot")?;

        let key_len = read_u16(slot, 0, "key length")? as usize;
        let key = read_bytes(slot, KEY_LEN_SIZE, key_len, "key")?;
        let tag_at = KEY_LEN_SIZE + key_len;
        let tag = read_bytes(slot, tag_at, TAG_SIZE, "slot tag")?[0];
        let tag = SlotTag::try_from(tag)
            .map_err(|tag| Error::corrupt(format!("unknown slot tag {:#04x}", tag)))?;

        let payload_at = tag_at + TAG_SIZE;
        let link = match tag {
            SlotTag::Value => SlotLink::Value(read_u64(slot, payload_at, "value offset")?),
            SlotTag::Child => SlotLink::Child(read_u32(slot, payload_at, "child offset")?),
        };
        if payload_at + tag.payload_len() != slot_len {
            return Err(Error::corrupt(format!(
                "slot length {} does not match its {}-byte contents",
                slot_len,
                payload_at + tag.payload_len()
            )));
        }

        self.pos += SLOT_LEN_SIZE + slot_len;
        Ok(Slot { key, link })
    }
}

impl<'a> Iterator for Slots<'a> {
    type Item = Result<Slot<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.body.len() {
            return None;
        }
        let slot = self.parse_next();
        if slot.is_err() {
            self.pos = self.body.len();
        }
        Some(slot)
    }
}

/// Shape of a file as found by [`DbReader::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub branch_count: usize,
    pub leaf_count: usize,
    pub entry_count: usize,
    /// Branch levels above the leaves.
    pub height: usize,
}

impl FileSummary {
    pub fn node_count(&self) -> usize {
        self.branch_count + self.leaf_count
    }
}

/// Read-only view of a RoflDB file.
///
/// # Example
/// ```
/// use rofldb::{BPlusTree, DbReader};
///
/// let tree: BPlusTree = [("a", "1"), ("b", "2")].into_iter().collect();
/// let packed = tree.pack().unwrap();
///
/// let reader = DbReader::new(packed.as_bytes()).unwrap();
/// assert_eq!(reader.get("b").unwrap(), Some(&b"2"[..]));
/// assert_eq!(reader.get("c").unwrap(), None);
/// ```
#[derive(Debug)]
pub struct DbReader<'a> {
    tree: &'a [u8],
    heap: &'a [u8],
    stats: ReaderStats,
}

impl<'a> DbReader<'a> {
    /// Check the header and section lengths of `data` and open a reader.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` for a bad magic, a section running past the
    /// end of the buffer, or trailing bytes after the value heap.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::parse(data).inspect_err(|e| warn!(error = %e, "rejected rofldb buffer"))
    }

    fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < MIN_FILE_LEN {
            return Err(Error::corrupt(format!("file of {} bytes is too short", data.len())));
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err(Error::corrupt("bad magic"));
        }

        let tree_len = read_u32(data, OFFSET_TREE_LEN, "tree length")? as usize;
        if tree_len < RECORD_LEN_SIZE {
            return Err(Error::corrupt("tree section has no root record"));
        }
        let tree = read_bytes(data, TREE_START, tree_len, "tree section")?;

        let heap_len_at = TREE_START + tree_len;
        let heap_len = read_u64(data, heap_len_at, "heap length")?;
        let heap_len = usize::try_from(heap_len)
            .map_err(|_| Error::corrupt(format!("heap length {} out of range", heap_len)))?;
        let heap = read_bytes(data, heap_len_at + HEAP_LEN_SIZE, heap_len, "value heap")?;

        let end = heap_len_at + HEAP_LEN_SIZE + heap_len;
        if end != data.len() {
            return Err(Error::corrupt(format!(
                "{} trailing bytes after the value heap",
                data.len() - end
            )));
        }

        debug!(tree_len, heap_len, "opened rofldb buffer");
        Ok(Self {
            tree,
            heap,
            stats: ReaderStats::new(),
        })
    }

    // ========================================================================
    // Public API: Sections
    // ========================================================================

    #[inline]
    pub fn tree_len(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// The root record, located at the start of the tree section.
    pub fn root(&self) -> Result<NodeRecord<'a>> {
        self.node_at(0)
    }

    /// Parse the node record at `offset` from the tree section start.
    pub fn node_at(&self, offset: u32) -> Result<NodeRecord<'a>> {
        let at = offset as usize;
        let body_len = read_u32(self.tree, at, "record length")? as usize;
        let body = read_bytes(self.tree, at + RECORD_LEN_SIZE, body_len, "node record")?;
        Ok(NodeRecord { offset, body })
    }

    /// Read the heap entry at `offset`.
    pub fn value_at(&self, offset: u64) -> Result<&'a [u8]> {
        let at = usize::try_from(offset)
            .map_err(|_| Error::corrupt(format!("value offset {} out of range", offset)))?;
        let len = read_u32(self.heap, at, "value length")? as usize;
        read_bytes(self.heap, at + VALUE_LEN_SIZE, len, "value")
    }

    /// Follow a child pointer out of `parent`.
    ///
    /// Children are always written after their parent, so a pointer that
    /// does not point forward is corrupt. This also rules out cycles.
    fn child_of(&self, parent: &NodeRecord<'a>, offset: u32) -> Result<NodeRecord<'a>> {
        if offset <= parent.offset {
            return Err(Error::corrupt(format!(
                "child pointer {} of node {} does not point forward",
                offset, parent.offset
            )));
        }
        self.node_at(offset)
    }

    // ========================================================================
    // Public API: Lookup
    // ========================================================================

    /// Value stored for `key`, or `None` if absent.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if a record on the lookup path is malformed.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<&'a [u8]>> {
        let key = key.as_ref();
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let found = self.lookup(key)?;
        let counter = if found.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn lookup(&self, key: &[u8]) -> Result<Option<&'a [u8]>> {
        let mut node = self.root()?;
        loop {
            self.stats.nodes_visited.fetch_add(1, Ordering::Relaxed);

            let mut descend = None;
            for slot in node.slots() {
                let slot = slot?;
                match slot.link {
                    SlotLink::Value(offset) if slot.key == key => {
                        return self.value_at(offset).map(Some);
                    }
                    // leaf keys are sorted, nothing further can match
                    SlotLink::Value(_) if slot.key > key => return Ok(None),
                    SlotLink::Value(_) => {}
                    SlotLink::Child(offset) if slot.routes(key) => {
                        descend = Some(offset);
                        break;
                    }
                    SlotLink::Child(_) => {}
                }
            }

            match descend {
                Some(offset) => node = self.child_of(&node, offset)?,
                None => return Ok(None),
            }
        }
    }

    // ========================================================================
    // Public API: Iteration
    // ========================================================================

    /// All `(key, value)` pairs in key order.
    ///
    /// The file has no leaf links, so this walks the tree depth-first.
    /// The iterator yields an error and stops at the first corrupt record.
    pub fn entries(&self) -> Entries<'_, 'a> {
        match self.root() {
            Ok(root) => Entries {
                reader: self,
                stack: vec![(root, root.slots())],
                pending: None,
            },
            Err(e) => Entries {
                reader: self,
                stack: Vec::new(),
                pending: Some(e),
            },
        }
    }

    // ========================================================================
    // Public API: Verification
    // ========================================================================

    /// Walk the whole file and check its structure.
    ///
    /// Checks that every record parses, each node is reached exactly once
    /// through a forward pointer, nodes are pure branches or pure leaves,
    /// keys respect their separators, all leaves sit at the same depth, every
    /// value resolves, and the records exactly fill the tree section.
    pub fn verify(&self) -> Result<FileSummary> {
        self.walk()
            .inspect_err(|e| warn!(error = %e, "rofldb verification failed"))
    }

    /// Number of node records, found by a full [`verify`](Self::verify) walk.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.verify()?.node_count())
    }

    fn walk(&self) -> Result<FileSummary> {
        let mut summary = FileSummary::default();
        let mut visited = HashSet::new();
        let mut covered = 0usize;
        let mut leaf_depth = None;

        // (record, lower bound inclusive, upper bound exclusive, depth)
        let mut stack: Vec<(NodeRecord<'a>, Option<&'a [u8]>, Option<&'a [u8]>, usize)> =
            vec![(self.root()?, None, None, 0)];

        while let Some((node, lower, upper, depth)) = stack.pop() {
            if !visited.insert(node.offset) {
                return Err(Error::corrupt(format!("node {} is referenced twice", node.offset)));
            }
            covered += node.encoded_len();

            let slots = node.slots().collect::<Result<Vec<_>>>()?;
            let in_bounds = |key: &[u8]| {
                lower.map_or(true, |lower| key >= lower) && upper.map_or(true, |upper| key < upper)
            };

            if node.is_leaf()? {
                if slots.is_empty() && node.offset != 0 {
                    return Err(Error::corrupt(format!("empty non-root node {}", node.offset)));
                }
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(Error::corrupt(format!(
                            "leaf {} at depth {}, expected {}",
                            node.offset, depth, d
                        )));
                    }
                    Some(_) => {}
                }
                for (index, slot) in slots.iter().enumerate() {
                    if index > 0 && slots[index - 1].key >= slot.key {
                        return Err(Error::corrupt(format!("unsorted keys in leaf {}", node.offset)));
                    }
                    if !in_bounds(slot.key) {
                        return Err(Error::corrupt(format!(
                            "key outside its separators in leaf {}",
                            node.offset
                        )));
                    }
                    if let SlotLink::Value(offset) = slot.link {
                        self.value_at(offset)?;
                    }
                }
                summary.leaf_count += 1;
                summary.entry_count += slots.len();
                continue;
            }

            summary.branch_count += 1;
            let last = slots.len() - 1;
            let mut child_lower = lower;
            let mut children = Vec::with_capacity(slots.len());
            for (index, slot) in slots.iter().enumerate() {
                let SlotLink::Child(offset) = slot.link else {
                    return Err(Error::corrupt(format!(
                        "branch {} mixes values and children",
                        node.offset
                    )));
                };
                if (index == last) != slot.key.is_empty() {
                    return Err(Error::corrupt(format!(
                        "branch {} has a keyless slot that is not last",
                        node.offset
                    )));
                }
                let child_upper = if index == last { upper } else { Some(slot.key) };
                if index < last
                    && (!in_bounds(slot.key) || child_lower.is_some_and(|l| slot.key <= l))
                {
                    return Err(Error::corrupt(format!(
                        "separator out of order in branch {}",
                        node.offset
                    )));
                }
                children.push((self.child_of(&node, offset)?, child_lower, child_upper, depth + 1));
                child_lower = child_upper;
            }
            // pop children left to right
            stack.extend(children.into_iter().rev());
        }

        if covered != self.tree.len() {
            return Err(Error::corrupt(format!(
                "node records cover {} of {} tree bytes",
                covered,
                self.tree.len()
            )));
        }
        summary.height = leaf_depth.unwrap_or(0);
        Ok(summary)
    }
}

/// Ordered `(key, value)` iterator created by [`DbReader::entries`].
pub struct Entries<'r, 'a> {
    reader: &'r DbReader<'a>,
    stack: Vec<(NodeRecord<'a>, Slots<'a>)>,
    pending: Option<Error>,
}

impl<'a> Iterator for Entries<'_, 'a> {
    type Item = Result<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }
        loop {
            let (node, slots) = self.stack.last_mut()?;
            let node = *node;
            let step = match slots.next() {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(step) => step,
            };

            let result = step.and_then(|slot| match slot.link {
                SlotLink::Value(offset) => {
                    self.reader.value_at(offset).map(|value| Some((slot.key, value)))
                }
                SlotLink::Child(offset) => {
                    let child = self.reader.child_of(&node, offset)?;
                    self.stack.push((child, child.slots()));
                    Ok(None)
                }
            });

            match result {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => {}
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
