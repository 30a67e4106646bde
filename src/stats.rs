//! I/O statistics registry.
//!
//! The registry separates logical traffic (page accesses at the file API)
//! from physical traffic (actual disk transfers), and additionally counts
//! pin operations and dirty-mark transitions. The benchmark harnesses reset
//! the counters around each measured phase and read them back afterwards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by the buffer pool and the file layer.
///
/// Counters use relaxed atomics: the engine is single-threaded cooperative
/// and readers only look after quiescence, so no ordering is required.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    /// Page accesses through `get_this_page` / `get_first_page` / `get_next_page`.
    logical_reads: AtomicU64,
    /// `unfix_page(dirty = true)` calls at the file API.
    logical_writes: AtomicU64,
    /// Pages read from disk into a frame.
    physical_reads: AtomicU64,
    /// Pages written back from a frame to disk.
    physical_writes: AtomicU64,
    /// Alias for physical reads, kept separate for textbook I/O cost formulas.
    input_count: AtomicU64,
    /// Alias for physical writes.
    output_count: AtomicU64,
    /// Successful pin operations (0 -> 1 and n -> n + 1 alike).
    page_fixes: AtomicU64,
    /// Clean-to-dirty transitions within a frame residency.
    dirty_marks: AtomicU64,
}

impl StatsRegistry {
    /// Creates a registry with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.logical_reads.store(0, Ordering::Relaxed);
        self.logical_writes.store(0, Ordering::Relaxed);
        self.physical_reads.store(0, Ordering::Relaxed);
        self.physical_writes.store(0, Ordering::Relaxed);
        self.input_count.store(0, Ordering::Relaxed);
        self.output_count.store(0, Ordering::Relaxed);
        self.page_fixes.store(0, Ordering::Relaxed);
        self.dirty_marks.store(0, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            logical_reads: self.logical_reads.load(Ordering::Relaxed),
            logical_writes: self.logical_writes.load(Ordering::Relaxed),
            physical_reads: self.physical_reads.load(Ordering::Relaxed),
            physical_writes: self.physical_writes.load(Ordering::Relaxed),
            input_count: self.input_count.load(Ordering::Relaxed),
            output_count: self.output_count.load(Ordering::Relaxed),
            page_fixes: self.page_fixes.load(Ordering::Relaxed),
            dirty_marks: self.dirty_marks.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_logical_read(&self) {
        self.logical_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_logical_write(&self) {
        self.logical_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_physical_read(&self) {
        self.physical_reads.fetch_add(1, Ordering::Relaxed);
        self.input_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_physical_write(&self) {
        self.physical_writes.fetch_add(1, Ordering::Relaxed);
        self.output_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_fix(&self) {
        self.page_fixes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dirty_mark(&self) {
        self.dirty_marks.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time copy of the registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub logical_reads: u64,
    pub logical_writes: u64,
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub input_count: u64,
    pub output_count: u64,
    pub page_fixes: u64,
    pub dirty_marks: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "logical {}r/{}w, physical {}r/{}w, in/out {}/{}, fixes {}, dirty marks {}",
            self.logical_reads,
            self.logical_writes,
            self.physical_reads,
            self.physical_writes,
            self.input_count,
            self.output_count,
            self.page_fixes,
            self.dirty_marks,
        )
    }
}
