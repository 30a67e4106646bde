//! Paged-file layer.
//!
//! This module wraps the buffer pool with per-file semantics:
//! - File lifecycle: [`FileManager::create`], `destroy`, `open`, `close`
//! - Page allocation through an on-disk free list threaded through the
//!   first bytes of each free page
//! - Pinned page access (`get_this_page`, `get_first_page`,
//!   `get_next_page`) and release (`unfix_page`, `mark_dirty`)
//! - Logical I/O accounting: every successful page fetch is a logical
//!   read, every dirty unfix a logical write
//!
//! Page 0 of every file is the header ([`FileHeader`]); user pages are
//! numbered from 1. The header is read once at `open`, cached in the
//! open-file entry, and written back at `close` if it changed.

mod disk;
mod header;

pub use disk::DiskFile;
pub use header::{decode_page_link, encode_page_link, FileHeader, FILE_HEADER_SIZE, NO_PAGE};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::{BufferPool, Frame, ReplacementPolicy};
use crate::error::{PagekitError, Result};
use crate::stats::StatsRegistry;
use crate::PAGE_SIZE;

/// Identifier of an open file within one manager.
pub type FileId = u32;

/// Page number within a file; page 0 is always the header.
pub type PageNo = u32;

/// A token for an open paged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(FileId);

impl FileHandle {
    /// Returns the underlying file id.
    #[must_use]
    pub fn id(self) -> FileId {
        self.0
    }
}

/// Bookkeeping for one open file.
struct OpenFile {
    path: PathBuf,
    disk: Arc<Mutex<DiskFile>>,
    /// Header cached for the lifetime of the open.
    header: FileHeader,
    header_dirty: bool,
    /// Replacement policy applied to this file's misses, if overridden.
    policy: Option<ReplacementPolicy>,
    /// Pages currently on the free list. Built by walking the on-disk
    /// chain at open; data pages carry no used/free marker of their own.
    free_set: HashSet<PageNo>,
}

/// Owns the buffer pool and the open-file table, and exposes the page API
/// the access methods and benchmark harnesses are written against.
pub struct FileManager {
    pool: BufferPool,
    stats: Arc<StatsRegistry>,
    open_files: Mutex<HashMap<FileId, OpenFile>>,
    next_file_id: AtomicU32,
}

impl FileManager {
    /// Creates a manager over the given pool.
    #[must_use]
    pub fn new(pool: BufferPool) -> Self {
        let stats = pool.stats();
        Self {
            pool,
            stats,
            open_files: Mutex::new(HashMap::new()),
            next_file_id: AtomicU32::new(1),
        }
    }

    /// Returns the underlying buffer pool.
    #[must_use]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Returns the shared statistics registry.
    #[must_use]
    pub fn stats(&self) -> Arc<StatsRegistry> {
        Arc::clone(&self.stats)
    }

    /// Creates an empty paged file: a single header page, no free pages.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] if the path already exists, or
    /// an I/O error from writing the header.
    pub fn create(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Err(PagekitError::InvalidFile(format!(
                "{} already exists",
                path.display()
            )));
        }
        let mut disk = DiskFile::create(path)?;
        let mut page = [0u8; PAGE_SIZE];
        FileHeader::new().encode(&mut page);
        disk.write_page(0, &page)?;
        disk.sync()?;
        debug!(path = %path.display(), "created paged file");
        Ok(())
    }

    /// Removes a paged file from persistent storage.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] if the path does not exist or
    /// the file is currently open.
    pub fn destroy(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PagekitError::InvalidFile(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let canonical = path.canonicalize()?;
        let open_files = self.open_files.lock();
        if open_files.values().any(|entry| {
            entry
                .path
                .canonicalize()
                .is_ok_and(|open_path| open_path == canonical)
        }) {
            return Err(PagekitError::InvalidFile(format!(
                "{} is open",
                path.display()
            )));
        }
        drop(open_files);
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Opens a paged file with the pool's default replacement policy.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] if the path is missing,
    /// already open, or carries a corrupt header or free list.
    pub fn open(&self, path: &Path) -> Result<FileHandle> {
        self.open_impl(path, None)
    }

    /// Opens a paged file with a per-file replacement policy override.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`FileManager::open`].
    pub fn open_with_policy(
        &self,
        path: &Path,
        policy: ReplacementPolicy,
    ) -> Result<FileHandle> {
        self.open_impl(path, Some(policy))
    }

    fn open_impl(&self, path: &Path, policy: Option<ReplacementPolicy>) -> Result<FileHandle> {
        if !path.exists() {
            return Err(PagekitError::InvalidFile(format!(
                "{} does not exist",
                path.display()
            )));
        }
        let canonical = path.canonicalize()?;
        {
            let open_files = self.open_files.lock();
            if open_files.values().any(|entry| {
                entry
                    .path
                    .canonicalize()
                    .is_ok_and(|open_path| open_path == canonical)
            }) {
                return Err(PagekitError::InvalidFile(format!(
                    "{} is already open",
                    path.display()
                )));
            }
        }

        let mut disk = DiskFile::open(path)?;
        let mut page = [0u8; PAGE_SIZE];
        disk.read_page(0, &mut page)?;
        let file_header = FileHeader::decode(&page)?;
        let free_set = Self::walk_free_list(&mut disk, &file_header)?;

        let file_id = self.next_file_id.fetch_add(1, Ordering::Relaxed);
        let disk = Arc::new(Mutex::new(disk));
        self.pool.register_file(file_id, Arc::clone(&disk));
        self.open_files.lock().insert(
            file_id,
            OpenFile {
                path: path.to_path_buf(),
                disk,
                header: file_header,
                header_dirty: false,
                policy,
                free_set,
            },
        );
        debug!(file = file_id, path = %path.display(), pages = file_header.num_pages, "opened paged file");
        Ok(FileHandle(file_id))
    }

    /// Collects the free-list members by following the on-disk chain.
    fn walk_free_list(disk: &mut DiskFile, file_header: &FileHeader) -> Result<HashSet<PageNo>> {
        let mut free_set = HashSet::new();
        let mut next = file_header.first_free;
        let mut page = [0u8; PAGE_SIZE];
        while let Some(page_no) = next {
            if page_no == 0 || page_no >= file_header.num_pages || !free_set.insert(page_no) {
                return Err(PagekitError::InvalidFile(format!(
                    "corrupt free list at page {page_no}"
                )));
            }
            disk.read_page(page_no, &mut page)?;
            next = decode_page_link(&page[0..4])?;
        }
        Ok(free_set)
    }

    /// Flushes and evicts this file's pages, writes the header back if it
    /// changed, and releases the open-file entry.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::PageAlreadyPinned`] if a pin was leaked (the
    /// file stays open so the caller can release it), or an I/O error from
    /// the flush.
    pub fn close(&self, handle: FileHandle) -> Result<()> {
        {
            let open_files = self.open_files.lock();
            Self::entry(&open_files, handle)?;
        }
        // A leaked pin surfaces here, before the entry is released.
        self.pool.flush_file(handle.0)?;

        let entry = self
            .open_files
            .lock()
            .remove(&handle.0)
            .expect("entry checked above");
        if entry.header_dirty {
            let mut page = [0u8; PAGE_SIZE];
            entry.header.encode(&mut page);
            let mut disk = entry.disk.lock();
            disk.write_page(0, &page)?;
        }
        entry.disk.lock().sync()?;
        self.pool.unregister_file(handle.0);
        debug!(file = handle.0, "closed paged file");
        Ok(())
    }

    /// Overrides the replacement policy for this file's subsequent misses.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] for a stale handle.
    pub fn set_file_policy(&self, handle: FileHandle, policy: ReplacementPolicy) -> Result<()> {
        let mut open_files = self.open_files.lock();
        let entry = Self::entry_mut(&mut open_files, handle)?;
        entry.policy = Some(policy);
        Ok(())
    }

    /// Returns the total page count, including the header page.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] for a stale handle.
    pub fn num_pages(&self, handle: FileHandle) -> Result<u32> {
        let open_files = self.open_files.lock();
        Ok(Self::entry(&open_files, handle)?.header.num_pages)
    }

    /// Returns how many pages are currently on the free list.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] for a stale handle.
    pub fn free_page_count(&self, handle: FileHandle) -> Result<usize> {
        let open_files = self.open_files.lock();
        Ok(Self::entry(&open_files, handle)?.free_set.len())
    }

    /// Allocates a page: pops the free-list head if there is one, otherwise
    /// appends a fresh page. Returned pinned; contents are undefined until
    /// the caller initializes them.
    ///
    /// # Errors
    ///
    /// Propagates pool failures (`BufferExhausted`, I/O errors).
    pub fn alloc_page(&self, handle: FileHandle) -> Result<(PageNo, Frame)> {
        let mut open_files = self.open_files.lock();
        let entry = Self::entry_mut(&mut open_files, handle)?;

        if let Some(page_no) = entry.header.first_free {
            // The reclaimed page holds the link to the next free page in
            // its first four bytes.
            let frame = self.pool.get(handle.0, page_no, entry.policy)?;
            let next = decode_page_link(&frame.data()[0..4])?;
            entry.header.first_free = next;
            entry.header_dirty = true;
            entry.free_set.remove(&page_no);
            debug!(file = handle.0, page = page_no, "reallocated free page");
            Ok((page_no, frame))
        } else {
            let page_no = entry.header.num_pages;
            entry.header.num_pages += 1;
            entry.header_dirty = true;
            let frame = self.pool.alloc(handle.0, page_no, entry.policy)?;
            debug!(file = handle.0, page = page_no, "appended page");
            Ok((page_no, frame))
        }
    }

    /// Pushes an unpinned page onto the free list. Subsequent fetches of
    /// the page report [`PagekitError::InvalidPage`] until it is
    /// reallocated.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidPage`] for the header page, an
    /// out-of-range page, or a page already on the free list, and
    /// [`PagekitError::PageAlreadyPinned`] if the page is still pinned.
    pub fn dispose_page(&self, handle: FileHandle, page_no: PageNo) -> Result<()> {
        let mut open_files = self.open_files.lock();
        let entry = Self::entry_mut(&mut open_files, handle)?;
        Self::check_user_page(entry, handle, page_no)?;
        if self.pool.is_pinned(handle.0, page_no) {
            return Err(PagekitError::PageAlreadyPinned {
                file: handle.0,
                page: page_no,
            });
        }

        // No disk read: the page's old contents are dead, only the link
        // matters. `alloc` reuses the resident frame when there is one.
        let frame = self.pool.alloc(handle.0, page_no, entry.policy)?;
        frame.data_mut()[0..4].copy_from_slice(&encode_page_link(entry.header.first_free));
        drop(frame);
        self.pool.unfix(handle.0, page_no, true)?;

        entry.header.first_free = Some(page_no);
        entry.header_dirty = true;
        entry.free_set.insert(page_no);
        debug!(file = handle.0, page = page_no, "disposed page");
        Ok(())
    }

    /// Fetches the lowest-numbered user page not on the free list, pinned.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::EndOfFile`] if the file has no user pages.
    pub fn get_first_page(&self, handle: FileHandle) -> Result<(PageNo, Frame)> {
        self.next_user_page(handle, 0)
    }

    /// Fetches the next user page after `prev`, pinned. The caller may
    /// unfix `prev` before or after this call.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::EndOfFile`] when the iteration is exhausted.
    pub fn get_next_page(&self, handle: FileHandle, prev: PageNo) -> Result<(PageNo, Frame)> {
        self.next_user_page(handle, prev)
    }

    fn next_user_page(&self, handle: FileHandle, after: PageNo) -> Result<(PageNo, Frame)> {
        let open_files = self.open_files.lock();
        let entry = Self::entry(&open_files, handle)?;
        let candidate = (after + 1..entry.header.num_pages)
            .find(|page_no| !entry.free_set.contains(page_no))
            .ok_or(PagekitError::EndOfFile)?;
        if self.pool.is_pinned(handle.0, candidate) {
            return Err(PagekitError::PageAlreadyPinned {
                file: handle.0,
                page: candidate,
            });
        }
        let frame = self.fetch_user_page(entry, handle, candidate)?;
        Ok((candidate, frame))
    }

    /// Fetches the given user page, pinned.
    ///
    /// A page that is already pinned is reported as the *recoverable*
    /// [`PagekitError::PageAlreadyPinned`]; the pre-existing pin is left
    /// untouched and no second pin is taken.
    ///
    /// # Errors
    ///
    /// Also returns [`PagekitError::InvalidPage`] for the header page, an
    /// out-of-range page, or a disposed page.
    pub fn get_this_page(&self, handle: FileHandle, page_no: PageNo) -> Result<Frame> {
        let open_files = self.open_files.lock();
        let entry = Self::entry(&open_files, handle)?;
        Self::check_user_page(entry, handle, page_no)?;
        if self.pool.is_pinned(handle.0, page_no) {
            return Err(PagekitError::PageAlreadyPinned {
                file: handle.0,
                page: page_no,
            });
        }
        self.fetch_user_page(entry, handle, page_no)
    }

    fn fetch_user_page(
        &self,
        entry: &OpenFile,
        handle: FileHandle,
        page_no: PageNo,
    ) -> Result<Frame> {
        let frame = self.pool.get(handle.0, page_no, entry.policy)?;
        self.stats.record_logical_read();
        Ok(frame)
    }

    /// Releases one pin; `dirty = true` also counts as a logical write.
    ///
    /// # Errors
    ///
    /// Propagates [`PagekitError::PageNotInPool`] and
    /// [`PagekitError::PageUnpinned`] from the pool.
    pub fn unfix_page(&self, handle: FileHandle, page_no: PageNo, dirty: bool) -> Result<()> {
        {
            let open_files = self.open_files.lock();
            Self::entry(&open_files, handle)?;
        }
        self.pool.unfix(handle.0, page_no, dirty)?;
        if dirty {
            self.stats.record_logical_write();
        }
        Ok(())
    }

    /// Sets the dirty flag on a pinned page without releasing it.
    ///
    /// # Errors
    ///
    /// Propagates [`PagekitError::PageNotInPool`] and
    /// [`PagekitError::PageUnpinned`] from the pool.
    pub fn mark_dirty(&self, handle: FileHandle, page_no: PageNo) -> Result<()> {
        {
            let open_files = self.open_files.lock();
            Self::entry(&open_files, handle)?;
        }
        self.pool.mark_dirty(handle.0, page_no)
    }

    /// Returns a cursor over the file's user pages.
    #[must_use]
    pub fn scan(&self, handle: FileHandle) -> PageScan<'_> {
        PageScan {
            manager: self,
            handle,
            last: None,
            fixed: None,
        }
    }

    fn check_user_page(entry: &OpenFile, handle: FileHandle, page_no: PageNo) -> Result<()> {
        if page_no == 0 {
            return Err(PagekitError::InvalidPage {
                page: 0,
                reason: "page 0 is the file header".into(),
            });
        }
        if page_no >= entry.header.num_pages {
            return Err(PagekitError::InvalidPage {
                page: page_no,
                reason: format!(
                    "file {} has {} pages",
                    handle.0, entry.header.num_pages
                ),
            });
        }
        if entry.free_set.contains(&page_no) {
            return Err(PagekitError::InvalidPage {
                page: page_no,
                reason: "page is on the free list".into(),
            });
        }
        Ok(())
    }

    fn entry<'a>(
        open_files: &'a HashMap<FileId, OpenFile>,
        handle: FileHandle,
    ) -> Result<&'a OpenFile> {
        open_files
            .get(&handle.0)
            .ok_or_else(|| PagekitError::InvalidFile(format!("stale file handle {}", handle.0)))
    }

    fn entry_mut<'a>(
        open_files: &'a mut HashMap<FileId, OpenFile>,
        handle: FileHandle,
    ) -> Result<&'a mut OpenFile> {
        open_files
            .get_mut(&handle.0)
            .ok_or_else(|| PagekitError::InvalidFile(format!("stale file handle {}", handle.0)))
    }
}

/// A lazy, finite, non-restartable cursor over a file's user pages.
///
/// Each yielded page is pinned; release it with
/// [`PageScan::unfix_current`]. A page still fixed when `next` is called
/// again is released clean, so read-only scans may simply keep calling
/// `next`.
pub struct PageScan<'a> {
    manager: &'a FileManager,
    handle: FileHandle,
    last: Option<PageNo>,
    fixed: Option<PageNo>,
}

impl PageScan<'_> {
    /// Advances to the next user page, or `None` when exhausted.
    ///
    /// # Errors
    ///
    /// Propagates any file-layer failure other than end-of-file.
    pub fn next(&mut self) -> Result<Option<(PageNo, Frame)>> {
        if let Some(page_no) = self.fixed.take() {
            self.manager.unfix_page(self.handle, page_no, false)?;
        }
        let result = match self.last {
            None => self.manager.get_first_page(self.handle),
            Some(prev) => self.manager.get_next_page(self.handle, prev),
        };
        match result {
            Ok((page_no, frame)) => {
                self.last = Some(page_no);
                self.fixed = Some(page_no);
                Ok(Some((page_no, frame)))
            }
            Err(PagekitError::EndOfFile) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Releases the page yielded by the last `next` call.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::Storage`] if no page is currently fixed.
    pub fn unfix_current(&mut self, dirty: bool) -> Result<()> {
        let page_no = self
            .fixed
            .take()
            .ok_or_else(|| PagekitError::Storage("no page is currently fixed".into()))?;
        self.manager.unfix_page(self.handle, page_no, dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(pool_size: usize) -> (FileManager, PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.pf");
        let manager = FileManager::new(BufferPool::new(pool_size));
        manager.create(&path).unwrap();
        (manager, path, temp_dir)
    }

    #[test]
    fn test_create_open_close() {
        let (manager, path, _temp) = setup(4);

        let handle = manager.open(&path).unwrap();
        assert_eq!(manager.num_pages(handle).unwrap(), 1);
        assert_eq!(manager.free_page_count(handle).unwrap(), 0);
        manager.close(handle).unwrap();

        // The handle is dead after close.
        assert!(manager.num_pages(handle).is_err());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let (manager, path, _temp) = setup(4);
        assert!(matches!(
            manager.create(&path),
            Err(PagekitError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_destroy_refuses_open_file() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();

        assert!(matches!(
            manager.destroy(&path),
            Err(PagekitError::InvalidFile(_))
        ));

        manager.close(handle).unwrap();
        manager.destroy(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_alloc_appends_sequentially() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();

        for expected in 1..=3 {
            let (page_no, _frame) = manager.alloc_page(handle).unwrap();
            assert_eq!(page_no, expected);
            manager.unfix_page(handle, page_no, true).unwrap();
        }
        assert_eq!(manager.num_pages(handle).unwrap(), 4);

        manager.close(handle).unwrap();
    }

    #[test]
    fn test_dispose_and_reallocate() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();

        for _ in 0..3 {
            let (page_no, _frame) = manager.alloc_page(handle).unwrap();
            manager.unfix_page(handle, page_no, true).unwrap();
        }

        manager.dispose_page(handle, 2).unwrap();
        assert_eq!(manager.free_page_count(handle).unwrap(), 1);
        assert!(matches!(
            manager.get_this_page(handle, 2),
            Err(PagekitError::InvalidPage { page: 2, .. })
        ));

        // The free list is LIFO: the disposed page comes back first and
        // the file does not grow.
        let (page_no, _frame) = manager.alloc_page(handle).unwrap();
        assert_eq!(page_no, 2);
        manager.unfix_page(handle, page_no, true).unwrap();
        assert_eq!(manager.num_pages(handle).unwrap(), 4);

        manager.close(handle).unwrap();
    }

    #[test]
    fn test_free_list_survives_reopen() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();
        for _ in 0..3 {
            let (page_no, _frame) = manager.alloc_page(handle).unwrap();
            manager.unfix_page(handle, page_no, true).unwrap();
        }
        manager.dispose_page(handle, 1).unwrap();
        manager.dispose_page(handle, 3).unwrap();
        manager.close(handle).unwrap();

        let handle = manager.open(&path).unwrap();
        assert_eq!(manager.free_page_count(handle).unwrap(), 2);
        // LIFO order: page 3 was disposed last.
        let (first, _frame) = manager.alloc_page(handle).unwrap();
        assert_eq!(first, 3);
        manager.unfix_page(handle, first, true).unwrap();
        let (second, _frame) = manager.alloc_page(handle).unwrap();
        assert_eq!(second, 1);
        manager.unfix_page(handle, second, true).unwrap();
        manager.close(handle).unwrap();
    }

    #[test]
    fn test_iteration_skips_free_pages() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();
        for _ in 0..4 {
            let (page_no, _frame) = manager.alloc_page(handle).unwrap();
            manager.unfix_page(handle, page_no, true).unwrap();
        }
        manager.dispose_page(handle, 2).unwrap();

        let mut seen = Vec::new();
        let mut scan = manager.scan(handle);
        while let Some((page_no, _frame)) = scan.next().unwrap() {
            seen.push(page_no);
            scan.unfix_current(false).unwrap();
        }
        assert_eq!(seen, vec![1, 3, 4]);

        manager.close(handle).unwrap();
    }

    #[test]
    fn test_get_this_while_pinned_is_recoverable() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();
        let (page_no, _frame) = manager.alloc_page(handle).unwrap();

        assert!(matches!(
            manager.get_this_page(handle, page_no),
            Err(PagekitError::PageAlreadyPinned { .. })
        ));

        // The pre-existing pin is untouched: one unfix fully releases it.
        manager.unfix_page(handle, page_no, true).unwrap();
        let _frame = manager.get_this_page(handle, page_no).unwrap();
        manager.unfix_page(handle, page_no, false).unwrap();
        manager.close(handle).unwrap();
    }

    #[test]
    fn test_close_reports_leaked_pin() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();
        let (page_no, _frame) = manager.alloc_page(handle).unwrap();

        assert!(matches!(
            manager.close(handle),
            Err(PagekitError::PageAlreadyPinned { .. })
        ));

        // Releasing the pin lets the close succeed.
        manager.unfix_page(handle, page_no, true).unwrap();
        manager.close(handle).unwrap();
    }

    #[test]
    fn test_logical_counters() {
        let (manager, path, _temp) = setup(4);
        let handle = manager.open(&path).unwrap();
        let (page_no, _frame) = manager.alloc_page(handle).unwrap();
        manager.unfix_page(handle, page_no, true).unwrap();

        manager.stats().reset();
        let _frame = manager.get_this_page(handle, page_no).unwrap();
        manager.unfix_page(handle, page_no, true).unwrap();
        let _frame = manager.get_this_page(handle, page_no).unwrap();
        manager.unfix_page(handle, page_no, false).unwrap();

        let snap = manager.stats().snapshot();
        assert_eq!(snap.logical_reads, 2);
        assert_eq!(snap.logical_writes, 1);

        manager.close(handle).unwrap();
    }

    #[test]
    fn test_mark_dirty_without_unpinning() {
        let (manager, path, _temp) = setup(2);
        let handle = manager.open(&path).unwrap();

        let (page_no, frame) = manager.alloc_page(handle).unwrap();
        frame.data_mut()[0..4].copy_from_slice(b"mark");
        drop(frame);
        manager.mark_dirty(handle, page_no).unwrap();
        // A clean unfix afterwards must not lose the write.
        manager.unfix_page(handle, page_no, false).unwrap();
        manager.close(handle).unwrap();

        let handle = manager.open(&path).unwrap();
        let frame = manager.get_this_page(handle, page_no).unwrap();
        assert_eq!(&frame.data()[0..4], b"mark");
        drop(frame);
        manager.unfix_page(handle, page_no, false).unwrap();
        manager.close(handle).unwrap();

        // Marking an unpinned page is a discipline violation.
        let handle = manager.open(&path).unwrap();
        assert!(matches!(
            manager.mark_dirty(handle, page_no),
            Err(PagekitError::PageNotInPool { .. })
        ));
        manager.close(handle).unwrap();
    }

    #[test]
    fn test_data_survives_pool_turnover() {
        // Pool of one frame: every access after the first evicts.
        let (manager, path, _temp) = setup(1);
        let handle = manager.open(&path).unwrap();

        let mut pages = Vec::new();
        for tag in 0u32..5 {
            let (page_no, frame) = manager.alloc_page(handle).unwrap();
            frame.data_mut()[0..4].copy_from_slice(&tag.to_le_bytes());
            drop(frame);
            manager.unfix_page(handle, page_no, true).unwrap();
            pages.push(page_no);
        }

        for (tag, &page_no) in pages.iter().enumerate() {
            let frame = manager.get_this_page(handle, page_no).unwrap();
            assert_eq!(&frame.data()[0..4], &(tag as u32).to_le_bytes());
            drop(frame);
            manager.unfix_page(handle, page_no, false).unwrap();
        }

        manager.close(handle).unwrap();
    }
}
