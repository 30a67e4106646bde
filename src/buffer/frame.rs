//! Buffer frame: a pinned-page handle over one pool slot.

use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::file::{FileId, PageNo};
use crate::PAGE_SIZE;

/// Index of a frame within the pool's arena.
pub type FrameId = usize;

/// A frame in the buffer pool that holds a single page.
///
/// `Frame` is a cheap clone-able handle; the pool keeps one handle per slot
/// and returns clones from `get`/`alloc` so callers can read and write the
/// page bytes while it stays pinned. Each frame tracks:
/// - The `(file, page)` identity currently loaded (if any)
/// - Whether the page has been modified since it was loaded (dirty)
/// - How many callers currently hold the page (pin count)
#[derive(Debug, Clone)]
pub struct Frame(Arc<RwLock<FrameInner>>);

#[derive(Debug)]
struct FrameInner {
    /// Identity of the resident page, or `None` for an empty frame.
    id: Option<(FileId, PageNo)>,
    /// Raw page bytes.
    data: [u8; PAGE_SIZE],
    /// Number of active references to this page.
    pin_count: u32,
    /// Whether the page differs from its on-disk image.
    dirty: bool,
}

impl Frame {
    /// Creates a new empty frame.
    #[must_use]
    pub fn new() -> Self {
        Frame(Arc::new(RwLock::new(FrameInner {
            id: None,
            data: [0u8; PAGE_SIZE],
            pin_count: 0,
            dirty: false,
        })))
    }

    /// Returns a read-only view of the page bytes.
    #[must_use]
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8; PAGE_SIZE]> {
        RwLockReadGuard::map(self.0.read(), |inner| &inner.data)
    }

    /// Returns a mutable view of the page bytes.
    ///
    /// Writing through this view does not mark the frame dirty; dirtiness is
    /// declared through `unfix_page(dirty = true)` or `mark_dirty`.
    pub fn data_mut(&self) -> MappedRwLockWriteGuard<'_, [u8; PAGE_SIZE]> {
        RwLockWriteGuard::map(self.0.write(), |inner| &mut inner.data)
    }

    /// Returns the `(file, page)` identity of the resident page.
    #[must_use]
    pub fn id(&self) -> Option<(FileId, PageNo)> {
        self.0.read().id
    }

    pub(crate) fn set_id(&self, id: Option<(FileId, PageNo)>) {
        self.0.write().id = id;
    }

    /// Returns the current pin count.
    #[must_use]
    pub fn pin_count(&self) -> u32 {
        self.0.read().pin_count
    }

    /// Returns whether any caller currently holds this page.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    pub(crate) fn pin(&self) {
        self.0.write().pin_count += 1;
    }

    /// Decrements the pin count. The pool checks for zero before calling.
    pub(crate) fn unpin(&self) {
        let mut inner = self.0.write();
        debug_assert!(inner.pin_count > 0, "unpin of an unpinned frame");
        inner.pin_count = inner.pin_count.saturating_sub(1);
    }

    /// Returns whether the page has been modified since it was loaded.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.0.read().dirty
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.0.write().dirty = dirty;
    }

    /// Zeroes the bytes without touching pin count or identity.
    pub(crate) fn zero_data(&self) {
        self.0.write().data.fill(0);
    }

    /// Resets the frame to the empty state.
    pub(crate) fn reset(&self) {
        let mut inner = self.0.write();
        inner.id = None;
        inner.data.fill(0);
        inner.pin_count = 0;
        inner.dirty = false;
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
