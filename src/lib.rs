//! RoflDB - a read-only, file-backed B+Tree index.
//!
//! Build a tree in memory, pack it into a single immutable file, then serve
//! point lookups straight out of that file without deserializing it.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            RoflDB                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 In-memory tree (tree/)                   │   │
//! │  │   BPlusTree: insert + split, leaf chain, range queries   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓ pack()                           │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                  Serializer (format/)                    │   │
//! │  │   branches first, child pointers patched after writing  │   │
//! │  │   magic | tree section | value heap  →  PackedTree       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓ write_to_path()                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                  Read path (format/)                     │   │
//! │  │   RoflFile (mmap) → DbReader: get, entries, verify       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (NodeId, Error, config)
//! - [`tree`] - The mutable in-memory B+Tree
//! - [`format`] - File layout, packing and reading
//!
//! # Quick Start
//! ```no_run
//! use rofldb::{BPlusTree, RoflFile};
//!
//! let mut tree = BPlusTree::new();
//! tree.insert("apple", "red");
//! tree.insert("banana", "yellow");
//!
//! tree.pack()?.write_to_path("fruit.rofl")?;
//!
//! let file = RoflFile::open("fruit.rofl")?;
//! assert_eq!(file.reader()?.get("banana")?, Some(&b"yellow"[..]));
//! # Ok::<(), rofldb::Error>(())
//! ```

pub mod common;
pub mod format;
pub mod tree;

pub use common::config::DEFAULT_BRANCHING_FACTOR;
pub use common::{Error, NodeId, Result};

pub use format::{
    pack_sorted, pack_tree, DbReader, FileSummary, PackedTree, ReaderStats, RoflFile,
    StatsSnapshot,
};
pub use tree::{BPlusTree, CompareOp, Node};
