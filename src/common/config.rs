//! Configuration constants for RoflDB.

/// Branching factor used by [`BPlusTree::new`](crate::BPlusTree::new).
///
/// A leaf holds at most this many keys and a branch at most this many
/// children before it must split.
pub const DEFAULT_BRANCHING_FACTOR: usize = 32;

/// Smallest branching factor accepted by the tree.
///
/// With fewer than 3 slots a branch split can leave a node with no
/// separator keys at all.
pub const MIN_BRANCHING_FACTOR: usize = 3;

/// Largest key that fits the 2-byte key length field of a slot.
///
/// The slot itself also carries a 2-byte length prefix covering the key
/// length, key bytes, tag and the widest payload (8 bytes), so the key has
/// to leave room for those 11 bytes.
pub const MAX_KEY_LEN: usize = u16::MAX as usize - 11;

/// Largest value that fits the 4-byte length prefix of a heap entry.
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// Largest tree section addressable by 4-byte node offsets.
pub const MAX_TREE_SECTION_LEN: usize = u32::MAX as usize;
