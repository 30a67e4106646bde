//! Buffer pool management for page caching.
//!
//! This module implements a fixed-capacity buffer pool shared by every open
//! paged file. It provides:
//! - A hash index from `(file, page)` to the resident frame
//! - Page pinning and unpinning with reference counting
//! - Victim selection under a selectable LRU or MRU policy
//! - Dirty-page write-back and per-file flush/evict
//!
//! # Architecture
//!
//! Frames live in a fixed arena and are addressed by index; the usage-order
//! list and the page table never hand out frame identities to callers, only
//! clone-able [`Frame`] handles. A frame with a positive pin count is never
//! selected as a victim; when no unpinned frame exists the pool fails
//! rather than stall.

mod frame;
mod usage;

pub use frame::{Frame, FrameId};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{PagekitError, Result};
use crate::file::{DiskFile, FileId, PageNo};
use crate::stats::StatsRegistry;
use usage::UsageList;

/// Default number of frames in a newly created pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Victim-selection policy for page replacement.
///
/// Both policies share one recency order (every touch moves a frame to the
/// front); they differ only in which end of that order eviction scans from.
/// MRU earns its keep on repeated scans over a working set larger than the
/// pool, where evicting the page just touched is exactly right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    /// Evict the least recently touched unpinned frame.
    #[default]
    Lru,
    /// Evict the most recently touched unpinned frame.
    Mru,
}

impl FromStr for ReplacementPolicy {
    type Err = PagekitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(ReplacementPolicy::Lru),
            "mru" => Ok(ReplacementPolicy::Mru),
            other => Err(PagekitError::Storage(format!(
                "unknown replacement policy '{other}' (expected 'lru' or 'mru')"
            ))),
        }
    }
}

impl std::fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplacementPolicy::Lru => write!(f, "lru"),
            ReplacementPolicy::Mru => write!(f, "mru"),
        }
    }
}

/// Buffer pool for managing the in-memory page cache of all open files.
pub struct BufferPool {
    state: Mutex<PoolState>,
    stats: Arc<StatsRegistry>,
}

struct PoolState {
    /// Frame arena; slots are reused for the pool's lifetime.
    frames: Vec<Frame>,
    /// Maps resident page identities to frame indices.
    page_table: HashMap<(FileId, PageNo), FrameId>,
    /// Recency order over resident frames.
    usage: UsageList,
    /// Frames holding no page.
    free_frames: Vec<FrameId>,
    /// Disk files registered by the file layer, used for miss reads and
    /// dirty write-back.
    files: HashMap<FileId, Arc<Mutex<DiskFile>>>,
    /// Policy applied when neither the caller nor the open file overrides it.
    default_policy: ReplacementPolicy,
}

impl BufferPool {
    /// Creates a pool with the given number of frames.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                frames: (0..capacity).map(|_| Frame::new()).collect(),
                page_table: HashMap::with_capacity(capacity),
                usage: UsageList::new(),
                free_frames: (0..capacity).rev().collect(),
                files: HashMap::new(),
                default_policy: ReplacementPolicy::default(),
            }),
            stats: Arc::new(StatsRegistry::new()),
        }
    }

    /// Returns the number of frames in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Returns the number of pages currently resident.
    #[must_use]
    pub fn resident_pages(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Returns the shared statistics registry.
    #[must_use]
    pub fn stats(&self) -> Arc<StatsRegistry> {
        Arc::clone(&self.stats)
    }

    /// Returns the policy used when no override is supplied.
    #[must_use]
    pub fn default_policy(&self) -> ReplacementPolicy {
        self.state.lock().default_policy
    }

    /// Changes the total number of frames.
    ///
    /// # Errors
    ///
    /// Rejected with [`PagekitError::Storage`] while any page is resident.
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        let mut state = self.state.lock();
        if !state.page_table.is_empty() {
            return Err(PagekitError::Storage(
                "cannot resize the pool while pages are resident".into(),
            ));
        }
        state.frames = (0..capacity).map(|_| Frame::new()).collect();
        state.free_frames = (0..capacity).rev().collect();
        state.usage.clear();
        Ok(())
    }

    /// Changes the default replacement policy.
    ///
    /// # Errors
    ///
    /// Rejected with [`PagekitError::Storage`] while any page is resident.
    pub fn set_default_policy(&self, policy: ReplacementPolicy) -> Result<()> {
        let mut state = self.state.lock();
        if !state.page_table.is_empty() {
            return Err(PagekitError::Storage(
                "cannot change the default policy while pages are resident".into(),
            ));
        }
        state.default_policy = policy;
        Ok(())
    }

    /// Makes a disk file available for miss reads and write-back.
    pub(crate) fn register_file(&self, file_id: FileId, disk: Arc<Mutex<DiskFile>>) {
        self.state.lock().files.insert(file_id, disk);
    }

    /// Removes a disk file; the file layer evicts its pages first.
    pub(crate) fn unregister_file(&self, file_id: FileId) {
        self.state.lock().files.remove(&file_id);
    }

    /// Returns a pinned frame containing the given page, reading it from
    /// disk on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::BufferExhausted`] when every frame is pinned,
    /// [`PagekitError::InvalidFile`] for an unregistered file, or an I/O
    /// error from the miss read or a victim write-back.
    pub fn get(
        &self,
        file_id: FileId,
        page_no: PageNo,
        policy: Option<ReplacementPolicy>,
    ) -> Result<Frame> {
        self.fetch(file_id, page_no, policy, true)
    }

    /// Returns a pinned frame for the given page without reading disk.
    ///
    /// Used after the file layer extends a file: the frame bytes are zeroed
    /// and considered undefined until the caller initializes them.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`BufferPool::get`], minus the miss read.
    pub fn alloc(
        &self,
        file_id: FileId,
        page_no: PageNo,
        policy: Option<ReplacementPolicy>,
    ) -> Result<Frame> {
        self.fetch(file_id, page_no, policy, false)
    }

    fn fetch(
        &self,
        file_id: FileId,
        page_no: PageNo,
        policy: Option<ReplacementPolicy>,
        read_on_miss: bool,
    ) -> Result<Frame> {
        let mut state = self.state.lock();
        let key = (file_id, page_no);

        // Hit: both policies share the move-to-front so recency means the
        // same thing under LRU and MRU.
        if let Some(&frame_id) = state.page_table.get(&key) {
            let frame = state.frames[frame_id].clone();
            state.usage.touch(frame_id);
            frame.pin();
            self.stats.record_page_fix();
            return Ok(frame);
        }

        let policy = policy.unwrap_or(state.default_policy);
        let frame_id = Self::claim_frame(&mut state, policy, &self.stats)?;
        let frame = state.frames[frame_id].clone();

        if read_on_miss {
            let disk = Arc::clone(
                state
                    .files
                    .get(&file_id)
                    .ok_or_else(|| PagekitError::InvalidFile(format!("file {file_id} is not open")))?,
            );
            disk.lock().read_page(page_no, &mut frame.data_mut()[..])?;
            self.stats.record_physical_read();
        } else {
            frame.zero_data();
        }

        frame.set_id(Some(key));
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(key, frame_id);
        state.usage.touch(frame_id);
        self.stats.record_page_fix();
        Ok(frame)
    }

    /// Picks a frame for a new page: the free list first, then a victim.
    fn claim_frame(
        state: &mut PoolState,
        policy: ReplacementPolicy,
        stats: &StatsRegistry,
    ) -> Result<FrameId> {
        if let Some(frame_id) = state.free_frames.pop() {
            return Ok(frame_id);
        }

        let victim = match policy {
            ReplacementPolicy::Lru => state
                .usage
                .stale_first()
                .find(|&id| !state.frames[id].is_pinned()),
            ReplacementPolicy::Mru => state
                .usage
                .recent_first()
                .find(|&id| !state.frames[id].is_pinned()),
        }
        .ok_or(PagekitError::BufferExhausted {
            capacity: state.frames.len(),
        })?;

        let frame = state.frames[victim].clone();
        let (victim_file, victim_page) = frame
            .id()
            .expect("a frame in the usage order always has an identity");

        if frame.is_dirty() {
            let disk = Arc::clone(state.files.get(&victim_file).ok_or_else(|| {
                PagekitError::InvalidFile(format!("file {victim_file} is not open"))
            })?);
            disk.lock().write_page(victim_page, &frame.data()[..])?;
            stats.record_physical_write();
            frame.set_dirty(false);
            debug!(file = victim_file, page = victim_page, ?policy, "wrote back dirty victim");
        } else {
            debug!(file = victim_file, page = victim_page, ?policy, "evicted clean victim");
        }

        state.page_table.remove(&(victim_file, victim_page));
        state.usage.remove(victim);
        Ok(victim)
    }

    /// Releases one pin, optionally declaring the page modified.
    ///
    /// Dirty marking is idempotent within a residency: only the first
    /// clean-to-dirty transition is counted.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::PageNotInPool`] if the page is not resident
    /// and [`PagekitError::PageUnpinned`] if its pin count is already zero.
    pub fn unfix(&self, file_id: FileId, page_no: PageNo, dirty: bool) -> Result<()> {
        let state = self.state.lock();
        let frame = Self::resident_frame(&state, file_id, page_no)?;
        if !frame.is_pinned() {
            return Err(PagekitError::PageUnpinned {
                file: file_id,
                page: page_no,
            });
        }
        if dirty && !frame.is_dirty() {
            frame.set_dirty(true);
            self.stats.record_dirty_mark();
        }
        frame.unpin();
        Ok(())
    }

    /// Sets the dirty flag on a pinned page without unpinning it.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`BufferPool::unfix`].
    pub fn mark_dirty(&self, file_id: FileId, page_no: PageNo) -> Result<()> {
        let state = self.state.lock();
        let frame = Self::resident_frame(&state, file_id, page_no)?;
        if !frame.is_pinned() {
            return Err(PagekitError::PageUnpinned {
                file: file_id,
                page: page_no,
            });
        }
        if !frame.is_dirty() {
            frame.set_dirty(true);
            self.stats.record_dirty_mark();
        }
        Ok(())
    }

    /// Returns whether the given page is resident with a positive pin count.
    #[must_use]
    pub fn is_pinned(&self, file_id: FileId, page_no: PageNo) -> bool {
        let state = self.state.lock();
        state
            .page_table
            .get(&(file_id, page_no))
            .is_some_and(|&id| state.frames[id].is_pinned())
    }

    /// Writes back every dirty frame of the file and evicts all its frames.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::PageAlreadyPinned`] naming the first leaked
    /// pin, leaving the pool untouched, so callers can report the leak at
    /// close time.
    pub fn flush_file(&self, file_id: FileId) -> Result<()> {
        let mut state = self.state.lock();

        let mut resident: Vec<(FrameId, PageNo)> = state
            .page_table
            .iter()
            .filter(|(key, _)| key.0 == file_id)
            .map(|(key, &frame_id)| (frame_id, key.1))
            .collect();
        resident.sort_by_key(|&(_, page)| page);

        for &(frame_id, page_no) in &resident {
            if state.frames[frame_id].is_pinned() {
                return Err(PagekitError::PageAlreadyPinned {
                    file: file_id,
                    page: page_no,
                });
            }
        }

        for (frame_id, page_no) in resident {
            let frame = state.frames[frame_id].clone();
            if frame.is_dirty() {
                let disk = Arc::clone(state.files.get(&file_id).ok_or_else(|| {
                    PagekitError::InvalidFile(format!("file {file_id} is not open"))
                })?);
                disk.lock().write_page(page_no, &frame.data()[..])?;
                self.stats.record_physical_write();
            }
            state.page_table.remove(&(file_id, page_no));
            state.usage.remove(frame_id);
            frame.reset();
            state.free_frames.push(frame_id);
        }

        debug!(file = file_id, "flushed and evicted all frames");
        Ok(())
    }

    fn resident_frame(state: &PoolState, file_id: FileId, page_no: PageNo) -> Result<Frame> {
        state
            .page_table
            .get(&(file_id, page_no))
            .map(|&id| state.frames[id].clone())
            .ok_or(PagekitError::PageNotInPool {
                file: file_id,
                page: page_no,
            })
    }
}
