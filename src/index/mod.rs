//! Ordered index over a paged file.
//!
//! A B⁺-tree keyed by `i32` with `u32` record ids, written strictly against
//! the paged-file contract: `create`, `open`, `alloc_page`, `get_this_page`,
//! `unfix_page`, `close`. Its cost is therefore fully visible in the
//! statistics registry, which is what the index benchmark measures.
//!
//! ## Page layout
//!
//! Page 1 is the index meta page:
//!
//! ```text
//! [0..4)   root page: i32 LE
//! [4..12)  entry count: u64 LE
//! ```
//!
//! Every other page is a node with an 8-byte header:
//!
//! ```text
//! [0..2)   node_type: u16 LE (1 = internal, 2 = leaf)
//! [2..4)   entry_count: u16 LE
//! [4..8)   internal: rightmost child page, i32 LE
//!          leaf: next leaf page, i32 LE (-1 = none)
//! [8..)    fixed 8-byte entries, sorted by key:
//!            internal: key i32 LE, left child i32 LE
//!            leaf:     key i32 LE, record id u32 LE
//! ```
//!
//! An internal entry's child holds keys `<= key`; the rightmost child holds
//! everything greater. Duplicate keys are allowed and route left, so a
//! search returns the first inserted match.

use tracing::debug;

use crate::error::{PagekitError, Result};
use crate::file::{FileHandle, FileManager, PageNo};
use crate::PAGE_SIZE;

const NODE_HEADER_SIZE: usize = 8;
const ENTRY_SIZE: usize = 8;

const NODE_INTERNAL: u16 = 1;
const NODE_LEAF: u16 = 2;

/// Entries per node; identical for both node kinds in this layout.
pub const NODE_CAPACITY: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / ENTRY_SIZE;

/// Page number of the meta page inside the index file.
const META_PAGE: PageNo = 1;

#[derive(Debug, Clone, Copy)]
struct IndexMeta {
    root: PageNo,
    entries: u64,
}

/// A B⁺-tree index stored in one paged file.
pub struct BTreeIndex<'a> {
    manager: &'a FileManager,
    handle: FileHandle,
    meta: IndexMeta,
}

impl<'a> BTreeIndex<'a> {
    /// Creates a new index file containing an empty tree.
    ///
    /// # Errors
    ///
    /// Propagates file-layer failures; the path must not exist yet.
    pub fn create(manager: &'a FileManager, path: &std::path::Path) -> Result<Self> {
        manager.create(path)?;
        let handle = manager.open(path)?;

        let (meta_page, frame) = manager.alloc_page(handle)?;
        debug_assert_eq!(meta_page, META_PAGE);
        drop(frame);
        manager.unfix_page(handle, meta_page, true)?;

        let (root, frame) = manager.alloc_page(handle)?;
        write_leaf(&mut frame.data_mut()[..], &[], None);
        drop(frame);
        manager.unfix_page(handle, root, true)?;

        let mut index = Self {
            manager,
            handle,
            meta: IndexMeta { root, entries: 0 },
        };
        index.write_meta()?;
        debug!(path = %path.display(), "created index");
        Ok(index)
    }

    /// Opens an existing index file.
    ///
    /// # Errors
    ///
    /// Propagates file-layer failures and rejects a malformed meta page.
    pub fn open(manager: &'a FileManager, path: &std::path::Path) -> Result<Self> {
        let handle = manager.open(path)?;
        let frame = manager.get_this_page(handle, META_PAGE)?;
        let data = frame.data();
        let root = i32::from_le_bytes(data[0..4].try_into().expect("4-byte slice"));
        let entries = u64::from_le_bytes(data[4..12].try_into().expect("8-byte slice"));
        drop(data);
        drop(frame);
        manager.unfix_page(handle, META_PAGE, false)?;

        if root < 1 {
            return Err(PagekitError::InvalidFile(format!(
                "index meta names root page {root}"
            )));
        }
        Ok(Self {
            manager,
            handle,
            meta: IndexMeta {
                root: root as PageNo,
                entries,
            },
        })
    }

    /// Returns the underlying file handle, e.g. to set its policy.
    #[must_use]
    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Returns the number of entries in the index.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.meta.entries
    }

    /// Returns whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meta.entries == 0
    }

    /// Inserts a key / record-id pair. Duplicate keys are allowed.
    ///
    /// # Errors
    ///
    /// Propagates file-layer failures from node fetches and splits.
    pub fn insert(&mut self, key: i32, rid: u32) -> Result<()> {
        if let Some((separator, left, right)) = self.insert_into(self.meta.root, key, rid)? {
            // The root split: grow the tree by one level.
            let (new_root, frame) = self.manager.alloc_page(self.handle)?;
            write_internal(&mut frame.data_mut()[..], &[(separator, left)], right);
            drop(frame);
            self.manager.unfix_page(self.handle, new_root, true)?;
            self.meta.root = new_root;
        }
        self.meta.entries += 1;
        Ok(())
    }

    /// Returns the record id of the first entry matching `key`.
    ///
    /// # Errors
    ///
    /// Propagates file-layer failures from node fetches.
    pub fn search(&self, key: i32) -> Result<Option<u32>> {
        let mut page_no = self.meta.root;
        loop {
            let frame = self.manager.get_this_page(self.handle, page_no)?;
            let node = read_node(&frame.data()[..]);
            drop(frame);
            self.manager.unfix_page(self.handle, page_no, false)?;

            match node {
                Node::Internal { entries, rightmost } => {
                    page_no = route(&entries, rightmost, key);
                }
                Node::Leaf { entries, .. } => {
                    return Ok(entries
                        .iter()
                        .find(|&&(entry_key, _)| entry_key == key)
                        .map(|&(_, rid)| rid));
                }
            }
        }
    }

    /// Writes the meta page back and closes the underlying file.
    ///
    /// # Errors
    ///
    /// Propagates file-layer failures, including leaked-pin detection.
    pub fn close(self) -> Result<()> {
        self.write_meta()?;
        self.manager.close(self.handle)
    }

    fn write_meta(&self) -> Result<()> {
        let frame = self.manager.get_this_page(self.handle, META_PAGE)?;
        {
            let mut data = frame.data_mut();
            data[0..4].copy_from_slice(&(self.meta.root as i32).to_le_bytes());
            data[4..12].copy_from_slice(&self.meta.entries.to_le_bytes());
        }
        drop(frame);
        self.manager.unfix_page(self.handle, META_PAGE, true)
    }

    /// Recursive descent; a `Some` return carries `(separator, left, right)`
    /// of a child split the caller must absorb.
    fn insert_into(
        &mut self,
        page_no: PageNo,
        key: i32,
        rid: u32,
    ) -> Result<Option<(i32, PageNo, PageNo)>> {
        let frame = self.manager.get_this_page(self.handle, page_no)?;
        let node = read_node(&frame.data()[..]);
        drop(frame);
        self.manager.unfix_page(self.handle, page_no, false)?;

        match node {
            Node::Leaf {
                mut entries,
                next_leaf,
            } => {
                let pos = entries.partition_point(|&(entry_key, _)| entry_key <= key);
                entries.insert(pos, (key, rid));

                if entries.len() <= NODE_CAPACITY {
                    self.rewrite_leaf(page_no, &entries, next_leaf)?;
                    return Ok(None);
                }

                // Split: the left half keeps this page so the parent link
                // and leaf chain stay valid.
                let split_at = entries.len() / 2 + entries.len() % 2;
                let right_entries = entries.split_off(split_at);
                let separator = entries.last().expect("left half is never empty").0;

                let (right_page, frame) = self.manager.alloc_page(self.handle)?;
                write_leaf(&mut frame.data_mut()[..], &right_entries, next_leaf);
                drop(frame);
                self.manager.unfix_page(self.handle, right_page, true)?;

                self.rewrite_leaf(page_no, &entries, Some(right_page))?;
                debug!(page = page_no, right = right_page, "split leaf");
                Ok(Some((separator, page_no, right_page)))
            }
            Node::Internal {
                mut entries,
                mut rightmost,
            } => {
                let pos = entries.partition_point(|&(entry_key, _)| entry_key < key);
                let child = if pos < entries.len() {
                    entries[pos].1
                } else {
                    rightmost
                };

                let Some((separator, left, right)) = self.insert_into(child, key, rid)? else {
                    return Ok(None);
                };

                // The split child keeps keys <= separator; the new right
                // sibling takes over the child's old position.
                if pos < entries.len() {
                    entries[pos].1 = right;
                    entries.insert(pos, (separator, left));
                } else {
                    entries.push((separator, left));
                    rightmost = right;
                }

                if entries.len() <= NODE_CAPACITY {
                    self.rewrite_internal(page_no, &entries, rightmost)?;
                    return Ok(None);
                }

                let mid = entries.len() / 2;
                let right_entries = entries.split_off(mid + 1);
                let (promoted_key, promoted_child) =
                    entries.pop().expect("mid entry exists after split_off");

                let (right_page, frame) = self.manager.alloc_page(self.handle)?;
                write_internal(&mut frame.data_mut()[..], &right_entries, rightmost);
                drop(frame);
                self.manager.unfix_page(self.handle, right_page, true)?;

                self.rewrite_internal(page_no, &entries, promoted_child)?;
                debug!(page = page_no, right = right_page, "split internal node");
                Ok(Some((promoted_key, page_no, right_page)))
            }
        }
    }

    fn rewrite_leaf(
        &self,
        page_no: PageNo,
        entries: &[(i32, u32)],
        next_leaf: Option<PageNo>,
    ) -> Result<()> {
        let frame = self.manager.get_this_page(self.handle, page_no)?;
        write_leaf(&mut frame.data_mut()[..], entries, next_leaf);
        drop(frame);
        self.manager.unfix_page(self.handle, page_no, true)
    }

    fn rewrite_internal(
        &self,
        page_no: PageNo,
        entries: &[(i32, PageNo)],
        rightmost: PageNo,
    ) -> Result<()> {
        let frame = self.manager.get_this_page(self.handle, page_no)?;
        write_internal(&mut frame.data_mut()[..], entries, rightmost);
        drop(frame);
        self.manager.unfix_page(self.handle, page_no, true)
    }
}

enum Node {
    Internal {
        entries: Vec<(i32, PageNo)>,
        rightmost: PageNo,
    },
    Leaf {
        entries: Vec<(i32, u32)>,
        next_leaf: Option<PageNo>,
    },
}

fn route(entries: &[(i32, PageNo)], rightmost: PageNo, key: i32) -> PageNo {
    let pos = entries.partition_point(|&(entry_key, _)| entry_key < key);
    if pos < entries.len() {
        entries[pos].1
    } else {
        rightmost
    }
}

fn read_node(data: &[u8]) -> Node {
    let node_type = u16::from_le_bytes(data[0..2].try_into().expect("2-byte slice"));
    let count = u16::from_le_bytes(data[2..4].try_into().expect("2-byte slice")) as usize;
    let extra = i32::from_le_bytes(data[4..8].try_into().expect("4-byte slice"));

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let base = NODE_HEADER_SIZE + i * ENTRY_SIZE;
        let key = i32::from_le_bytes(data[base..base + 4].try_into().expect("4-byte slice"));
        let value = u32::from_le_bytes(data[base + 4..base + 8].try_into().expect("4-byte slice"));
        entries.push((key, value));
    }

    if node_type == NODE_INTERNAL {
        Node::Internal {
            entries,
            rightmost: extra as PageNo,
        }
    } else {
        Node::Leaf {
            entries,
            next_leaf: (extra >= 0).then_some(extra as PageNo),
        }
    }
}

fn write_leaf(data: &mut [u8], entries: &[(i32, u32)], next_leaf: Option<PageNo>) {
    write_node(
        data,
        NODE_LEAF,
        entries,
        next_leaf.map_or(-1, |page_no| page_no as i32),
    );
}

fn write_internal(data: &mut [u8], entries: &[(i32, PageNo)], rightmost: PageNo) {
    write_node(data, NODE_INTERNAL, entries, rightmost as i32);
}

fn write_node(data: &mut [u8], node_type: u16, entries: &[(i32, u32)], extra: i32) {
    debug_assert!(entries.len() <= NODE_CAPACITY);
    data[0..2].copy_from_slice(&node_type.to_le_bytes());
    data[2..4].copy_from_slice(&(entries.len() as u16).to_le_bytes());
    data[4..8].copy_from_slice(&extra.to_le_bytes());
    for (i, &(key, value)) in entries.iter().enumerate() {
        let base = NODE_HEADER_SIZE + i * ENTRY_SIZE;
        data[base..base + 4].copy_from_slice(&key.to_le_bytes());
        data[base + 4..base + 8].copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use tempfile::TempDir;

    fn setup() -> (FileManager, std::path::PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.idx");
        let manager = FileManager::new(BufferPool::new(16));
        (manager, path, temp_dir)
    }

    #[test]
    fn test_empty_index() {
        let (manager, path, _temp) = setup();
        let index = BTreeIndex::create(&manager, &path).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.search(42).unwrap(), None);
        index.close().unwrap();
    }

    #[test]
    fn test_insert_and_search_small() {
        let (manager, path, _temp) = setup();
        let mut index = BTreeIndex::create(&manager, &path).unwrap();

        for (rid, key) in [5, 3, 9, 1, 7].into_iter().enumerate() {
            index.insert(key, rid as u32).unwrap();
        }

        assert_eq!(index.len(), 5);
        assert_eq!(index.search(3).unwrap(), Some(1));
        assert_eq!(index.search(7).unwrap(), Some(4));
        assert_eq!(index.search(4).unwrap(), None);
        index.close().unwrap();
    }

    #[test]
    fn test_splits_preserve_all_keys() {
        // Enough sequential keys to force leaf and root splits.
        let (manager, path, _temp) = setup();
        let mut index = BTreeIndex::create(&manager, &path).unwrap();

        let count = NODE_CAPACITY as i32 * 3;
        for key in 0..count {
            index.insert(key, key as u32).unwrap();
        }

        assert_eq!(index.len(), count as u64);
        for key in 0..count {
            assert_eq!(index.search(key).unwrap(), Some(key as u32), "key {key}");
        }
        assert_eq!(index.search(count).unwrap(), None);
        index.close().unwrap();
    }

    #[test]
    fn test_reverse_insertion_order() {
        let (manager, path, _temp) = setup();
        let mut index = BTreeIndex::create(&manager, &path).unwrap();

        let count = NODE_CAPACITY as i32 * 2;
        for key in (0..count).rev() {
            index.insert(key, (key * 2) as u32).unwrap();
        }

        for key in 0..count {
            assert_eq!(index.search(key).unwrap(), Some((key * 2) as u32));
        }
        index.close().unwrap();
    }

    #[test]
    fn test_duplicate_keys_return_first_inserted() {
        let (manager, path, _temp) = setup();
        let mut index = BTreeIndex::create(&manager, &path).unwrap();

        index.insert(10, 1).unwrap();
        index.insert(10, 2).unwrap();
        index.insert(10, 3).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.search(10).unwrap(), Some(1));
        index.close().unwrap();
    }

    #[test]
    fn test_persists_across_reopen() {
        let (manager, path, _temp) = setup();
        {
            let mut index = BTreeIndex::create(&manager, &path).unwrap();
            for key in 0..100 {
                index.insert(key, (1000 + key) as u32).unwrap();
            }
            index.close().unwrap();
        }

        let index = BTreeIndex::open(&manager, &path).unwrap();
        assert_eq!(index.len(), 100);
        assert_eq!(index.search(57).unwrap(), Some(1057));
        index.close().unwrap();
    }
}
