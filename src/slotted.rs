//! Slotted-page codec for variable-length records.
//!
//! Operates purely on a page-sized byte buffer; no I/O and no knowledge of
//! the buffer pool. Layout (all multi-byte fields are `i16` LE):
//!
//! ```text
//! [0..2)  slot_count:     number of directory entries ever allocated
//! [2..4)  free_list_head: slot id of the first tombstone, -1 = none
//! [4..6)  free_ptr:       byte offset of the top of the record heap
//! [6..8)  attr_length:    advisory fixed record width, 0 = unknown
//! [8..)   slot directory, 4 bytes per entry, growing downward:
//!           offset: i16   (tombstones: next tombstoned slot id, -1 = end)
//!           length: i16   (negative marks a tombstone)
//! heap:   records packed upward from the page end, ending at free_ptr
//! ```
//!
//! Free space is the gap between the end of the directory and `free_ptr`.
//! Deleting a record leaves a tombstone so existing slot ids stay valid;
//! insertion reuses the tombstone chain before growing the directory, and
//! compacts the heap in place when the gap is fragmented.

use crate::error::{PagekitError, Result};
use crate::PAGE_SIZE;

/// Index into a page's slot directory.
pub type SlotId = u16;

/// Size of the page header in bytes.
pub const SLOTTED_HEADER_SIZE: usize = 8;

/// Size of one slot directory entry in bytes.
pub const SLOT_SIZE: usize = 4;

/// Largest record a single empty page can hold.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOTTED_HEADER_SIZE - SLOT_SIZE;

const NO_SLOT: i16 = -1;

const OFFSET_SLOT_COUNT: usize = 0;
const OFFSET_FREE_LIST_HEAD: usize = 2;
const OFFSET_FREE_PTR: usize = 4;
const OFFSET_ATTR_LENGTH: usize = 6;

/// A slotted-page view over a page buffer.
pub struct SlottedPage<'a> {
    buf: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    /// Wraps a page buffer without touching its contents.
    pub fn new(buf: &'a mut [u8]) -> Self {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        Self { buf }
    }

    /// Formats the buffer as an empty slotted page.
    pub fn init(&mut self) {
        self.buf.fill(0);
        self.write_i16(OFFSET_SLOT_COUNT, 0);
        self.write_i16(OFFSET_FREE_LIST_HEAD, NO_SLOT);
        self.write_i16(OFFSET_FREE_PTR, PAGE_SIZE as i16);
        self.write_i16(OFFSET_ATTR_LENGTH, 0);
    }

    /// Inserts a record, reusing a tombstoned slot when one exists.
    ///
    /// Compacts the heap in place if the gap is too fragmented; slot ids
    /// are preserved across compaction.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::NoSpace`] if the record does not fit even
    /// after compaction, and [`PagekitError::Storage`] for a zero-length
    /// record.
    pub fn insert(&mut self, record: &[u8]) -> Result<SlotId> {
        let len = record.len();
        if len == 0 {
            return Err(PagekitError::Storage(
                "zero-length records are not supported".into(),
            ));
        }
        if len > MAX_RECORD_SIZE {
            return Err(PagekitError::NoSpace(len));
        }

        let reuse = self.free_list_head() != NO_SLOT;
        let needed = len + if reuse { 0 } else { SLOT_SIZE };
        if self.free_space() < needed {
            self.compact();
            if self.free_space() < needed {
                return Err(PagekitError::NoSpace(len));
            }
        }

        let slot = if reuse {
            let slot = self.free_list_head() as SlotId;
            // The tombstone's offset field threads the free chain.
            let (next, _) = self.slot(slot);
            self.write_i16(OFFSET_FREE_LIST_HEAD, next);
            slot
        } else {
            let slot = self.slot_count();
            self.write_i16(OFFSET_SLOT_COUNT, (slot + 1) as i16);
            slot
        };

        let free_ptr = self.free_ptr() - len;
        self.buf[free_ptr..free_ptr + len].copy_from_slice(record);
        self.write_i16(OFFSET_FREE_PTR, free_ptr as i16);
        self.set_slot(slot, free_ptr as i16, len as i16);

        debug_assert!(self.directory_end() <= self.free_ptr());
        Ok(slot)
    }

    /// Tombstones a record; the slot id remains allocated for reuse.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidSlot`] for an out-of-range or
    /// already-deleted slot.
    pub fn delete(&mut self, slot: SlotId) -> Result<()> {
        self.check_live(slot)?;
        let head = self.free_list_head();
        self.set_slot(slot, head, NO_SLOT);
        self.write_i16(OFFSET_FREE_LIST_HEAD, slot as i16);
        Ok(())
    }

    /// Returns the record stored in a slot.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidSlot`] for an out-of-range or
    /// deleted slot.
    pub fn get(&self, slot: SlotId) -> Result<&[u8]> {
        self.check_live(slot)?;
        let (offset, length) = self.slot(slot);
        Ok(&self.buf[offset as usize..offset as usize + length as usize])
    }

    /// Returns the first live record with a slot id greater than `after`,
    /// or `None` when the page is exhausted. `None` as `after` starts the
    /// walk.
    #[must_use]
    pub fn next_live(&self, after: Option<SlotId>) -> Option<(SlotId, &[u8])> {
        let start = after.map_or(0, |slot| slot + 1);
        (start..self.slot_count()).find_map(|slot| {
            let (offset, length) = self.slot(slot);
            (length > 0).then(|| {
                let record = &self.buf[offset as usize..offset as usize + length as usize];
                (slot, record)
            })
        })
    }

    /// Iterates live records in ascending slot order.
    pub fn records(&self) -> impl Iterator<Item = (SlotId, &[u8])> + '_ {
        let mut cursor = None;
        std::iter::from_fn(move || {
            let (slot, record) = self.next_live(cursor)?;
            cursor = Some(slot);
            Some((slot, record))
        })
    }

    /// Returns the gap between the slot directory and the record heap.
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.free_ptr() - self.directory_end()
    }

    /// Returns the total length of all live records.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.records().map(|(_, record)| record.len()).sum()
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn live_records(&self) -> usize {
        self.records().count()
    }

    /// Returns the number of directory entries ever allocated.
    #[must_use]
    pub fn slot_count(&self) -> SlotId {
        self.read_i16(OFFSET_SLOT_COUNT) as SlotId
    }

    /// Returns the advisory fixed record width (0 = unknown).
    #[must_use]
    pub fn attr_length(&self) -> u16 {
        self.read_i16(OFFSET_ATTR_LENGTH) as u16
    }

    /// Records an advisory fixed record width.
    pub fn set_attr_length(&mut self, attr_length: u16) {
        self.write_i16(OFFSET_ATTR_LENGTH, attr_length as i16);
    }

    /// Pushes every live record to the highest unused address, closing the
    /// holes left by deletions. Only offsets change; slot ids survive.
    fn compact(&mut self) {
        let mut live: Vec<(SlotId, usize, usize)> = (0..self.slot_count())
            .filter_map(|slot| {
                let (offset, length) = self.slot(slot);
                (length > 0).then_some((slot, offset as usize, length as usize))
            })
            .collect();
        // Highest record first, stable on slot id for equal offsets.
        live.sort_by_key(|&(_, offset, _)| std::cmp::Reverse(offset));

        let mut dest = PAGE_SIZE;
        for (slot, offset, length) in live {
            dest -= length;
            if offset != dest {
                self.buf.copy_within(offset..offset + length, dest);
                self.set_slot(slot, dest as i16, length as i16);
            }
        }
        self.write_i16(OFFSET_FREE_PTR, dest as i16);
    }

    fn check_live(&self, slot: SlotId) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(PagekitError::InvalidSlot(slot));
        }
        let (_, length) = self.slot(slot);
        if length <= 0 {
            return Err(PagekitError::InvalidSlot(slot));
        }
        Ok(())
    }

    fn directory_end(&self) -> usize {
        SLOTTED_HEADER_SIZE + self.slot_count() as usize * SLOT_SIZE
    }

    fn free_ptr(&self) -> usize {
        self.read_i16(OFFSET_FREE_PTR) as usize
    }

    fn free_list_head(&self) -> i16 {
        self.read_i16(OFFSET_FREE_LIST_HEAD)
    }

    fn slot(&self, slot: SlotId) -> (i16, i16) {
        let base = SLOTTED_HEADER_SIZE + slot as usize * SLOT_SIZE;
        (self.read_i16(base), self.read_i16(base + 2))
    }

    fn set_slot(&mut self, slot: SlotId, offset: i16, length: i16) {
        let base = SLOTTED_HEADER_SIZE + slot as usize * SLOT_SIZE;
        self.write_i16(base, offset);
        self.write_i16(base + 2, length);
    }

    fn read_i16(&self, offset: usize) -> i16 {
        i16::from_le_bytes(self.buf[offset..offset + 2].try_into().expect("2-byte slice"))
    }

    fn write_i16(&mut self, offset: usize, value: i16) {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}
