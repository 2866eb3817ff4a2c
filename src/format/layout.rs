//! Byte layout of a RoflDB file.
//!
//! All integers are little-endian.
//!
//! # File
//! ```text
//! Offset   Size  Field
//! ------   ----  -----
//! 0        6     magic "ROFL\0\0"
//! 6        4     tree section length L
//! 10       L     tree section (root node record first)
//! 10+L     8     value heap length H
//! 18+L     H     value heap
//! ```
//!
//! # Node record
//! ```text
//! 4     record length (bytes after this field)
//! ...   slots
//! ```
//!
//! # Slot
//! ```text
//! 2     slot length (bytes after this field)
//! 2     key length (0 = no key, last child of a branch)
//! n     key bytes
//! 1     tag (SlotTag)
//! 8|4   payload: value heap offset | node offset from tree start
//! ```
//!
//! # Heap entry
//! ```text
//! 4     value length
//! n     value bytes
//! ```

use crate::common::{Error, Result};

/// File magic: `"ROFL"` followed by a zero format version.
pub const MAGIC: &[u8; 6] = b"ROFL\0\0";

pub const OFFSET_TREE_LEN: usize = 6;

/// Where the tree section, and therefore the root node, starts.
pub const TREE_START: usize = OFFSET_TREE_LEN + TREE_LEN_SIZE;

pub const TREE_LEN_SIZE: usize = 4;
pub const HEAP_LEN_SIZE: usize = 8;
pub const RECORD_LEN_SIZE: usize = 4;
pub const SLOT_LEN_SIZE: usize = 2;
pub const KEY_LEN_SIZE: usize = 2;
pub const TAG_SIZE: usize = 1;
pub const VALUE_OFFSET_SIZE: usize = 8;
pub const CHILD_OFFSET_SIZE: usize = 4;
pub const VALUE_LEN_SIZE: usize = 4;

/// Smallest well-formed file: header, empty root record, empty heap.
pub const MIN_FILE_LEN: usize = TREE_START + RECORD_LEN_SIZE + HEAP_LEN_SIZE;

/// Kind of payload a slot carries.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTag {
    /// 8-byte offset into the value heap.
    Value = 0,
    /// 4-byte offset of a child node record, relative to [`TREE_START`].
    Child = 1,
}

impl SlotTag {
    /// Size of the payload following the tag byte.
    #[inline]
    pub fn payload_len(self) -> usize {
        match self {
            SlotTag::Value => VALUE_OFFSET_SIZE,
            SlotTag::Child => CHILD_OFFSET_SIZE,
        }
    }
}

impl TryFrom<u8> for SlotTag {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SlotTag::Value),
            1 => Ok(SlotTag::Child),
            _ => Err(value),
        }
    }
}

// ============================================================================
// Little-endian field access
// ============================================================================

/// Borrow `len` bytes at `offset`, or fail as corrupt.
#[inline]
pub(crate) fn read_bytes<'d>(
    data: &'d [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'d [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            Error::corrupt(format!(
                "{} at offset {} runs past the end ({} bytes)",
                what,
                offset,
                data.len()
            ))
        })
}

#[inline]
pub(crate) fn read_u16(data: &[u8], offset: usize, what: &str) -> Result<u16> {
    let bytes = read_bytes(data, offset, 2, what)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize, what: &str) -> Result<u32> {
    let bytes = read_bytes(data, offset, 4, what)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub(crate) fn read_u64(data: &[u8], offset: usize, what: &str) -> Result<u64> {
    let bytes = read_bytes(data, offset, 8, what)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

// ============================================================================
// TESTS
// ============================================================================
