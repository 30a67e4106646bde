//! On-disk file header and free-list link codec.
//!
//! The layout of page 0 is frozen; files written by one build must read
//! bit-exactly in another:
//!
//! ```text
//! [0..4)  first_free: i32 LE  (page number of the free-list head, -1 = empty)
//! [4..8)  num_pages:  i32 LE  (total pages including this header, >= 1)
//! [8..)   unused, zero
//! ```
//!
//! A free-list node reuses its first four bytes for the link to the next
//! free page, in the same `i32` LE encoding.

use crate::error::{PagekitError, Result};
use crate::file::PageNo;

/// On-disk sentinel for "no page".
pub const NO_PAGE: i32 = -1;

/// Size of the encoded header in bytes.
pub const FILE_HEADER_SIZE: usize = 8;

/// Cached image of a paged file's header page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Head of the free-page list.
    pub first_free: Option<PageNo>,
    /// Total number of pages, including the header page itself.
    pub num_pages: u32,
}

impl FileHeader {
    /// Header of a freshly created file: no free pages, one header page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            first_free: None,
            num_pages: 1,
        }
    }

    /// Writes the header into the start of a page buffer.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&encode_page_link(self.first_free));
        buf[4..8].copy_from_slice(&(self.num_pages as i32).to_le_bytes());
    }

    /// Reads a header back from a page buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PagekitError::InvalidFile`] if the page count is not
    /// positive or the free-list head is a malformed negative value.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let first_free = decode_page_link(&buf[0..4])
            .map_err(|_| PagekitError::InvalidFile("malformed free-list head".into()))?;
        let num_pages = i32::from_le_bytes(buf[4..8].try_into().expect("4-byte slice"));
        if num_pages < 1 {
            return Err(PagekitError::InvalidFile(format!(
                "header page count {num_pages} is not positive"
            )));
        }
        Ok(Self {
            first_free,
            num_pages: num_pages as u32,
        })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a free-list link as the frozen 4-byte `i32` LE form.
#[must_use]
pub fn encode_page_link(link: Option<PageNo>) -> [u8; 4] {
    match link {
        Some(page_no) => (page_no as i32).to_le_bytes(),
        None => NO_PAGE.to_le_bytes(),
    }
}

/// Decodes a free-list link; `-1` means "none", other negatives are corrupt.
pub fn decode_page_link(bytes: &[u8]) -> Result<Option<PageNo>> {
    let raw = i32::from_le_bytes(bytes[0..4].try_into().expect("4-byte slice"));
    match raw {
        NO_PAGE => Ok(None),
        n if n < 0 => Err(PagekitError::InvalidPage {
            page: 0,
            reason: format!("malformed page link {n}"),
        }),
        n => Ok(Some(n as u32)),
    }
}
