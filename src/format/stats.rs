//! Lookup statistics for a [`DbReader`](super::DbReader).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by every lookup through a reader.
///
/// All fields are atomic so readers shared across threads can count
/// without locks. `Ordering::Relaxed` is enough: the counters are
/// independent and only read for reporting.
///
/// # Example
/// ```
/// use rofldb::ReaderStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = ReaderStats::new();
/// stats.hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct ReaderStats {
    /// Point lookups started.
    pub lookups: AtomicU64,

    /// Lookups that found their key.
    pub hits: AtomicU64,

    /// Lookups that did not.
    pub misses: AtomicU64,

    /// Node records parsed on lookup paths.
    pub nodes_visited: AtomicU64,
}

impl ReaderStats {
    pub fn new() -> Self {
        Self {
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            nodes_visited: AtomicU64::new(0),
        }
    }

    /// Fraction of lookups that found their key (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Non-atomic copy for display and logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            nodes_visited: self.nodes_visited.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.lookups.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.nodes_visited.store(0, Ordering::Relaxed);
    }
}

impl Default for ReaderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`ReaderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub nodes_visited: u64,
}

impl StatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Average number of nodes parsed per lookup.
    pub fn nodes_per_lookup(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.nodes_visited as f64 / self.lookups as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ lookups: {}, hits: {}, misses: {}, nodes/lookup: {:.2}, hit_rate: {:.2}% }}",
            self.lookups,
            self.hits,
            self.misses,
            self.nodes_per_lookup(),
            self.hit_rate() * 100.0
        )
    }
}
