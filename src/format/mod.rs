//! The RoflDB file format.
//!
//! # Components
//! - [`layout`] - Byte offsets, field sizes and slot tags
//! - [`PackedTree`] / [`pack_tree`] / [`pack_sorted`] - Serializing a tree
//! - [`DbReader`] - Zero-copy lookups over a serialized buffer
//! - [`ReaderStats`] - Per-reader lookup statistics
//! - [`RoflFile`] - Memory-mapped files on disk

mod file;
pub mod layout;
mod reader;
mod stats;
mod writer;

pub use file::RoflFile;
pub use reader::{DbReader, Entries, FileSummary, NodeRecord, Slot, SlotLink, Slots};
pub use stats::{ReaderStats, StatsSnapshot};
pub use writer::{pack_sorted, pack_tree, PackedTree};
