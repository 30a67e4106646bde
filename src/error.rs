//! Error types for pagekit storage operations.

use thiserror::Error;

/// Result type alias using [`PagekitError`].
pub type Result<T> = std::result::Result<T, PagekitError>;

/// Error types for pagekit storage operations.
#[derive(Debug, Error)]
pub enum PagekitError {
    /// Page iteration reached the end of the file.
    #[error("end of file")]
    EndOfFile,

    /// The requested page is currently pinned by another caller.
    ///
    /// This is the one recoverable condition in the file layer: the
    /// pre-existing pin is left untouched and the caller may skip the page.
    #[error("page {page} of file {file} is already pinned")]
    PageAlreadyPinned { file: u32, page: u32 },

    /// An unfix or dirty-mark targeted a page that is not resident.
    #[error("page {page} of file {file} is not in the buffer pool")]
    PageNotInPool { file: u32, page: u32 },

    /// An unfix or dirty-mark targeted a frame whose pin count is zero.
    #[error("page {page} of file {file} is not pinned")]
    PageUnpinned { file: u32, page: u32 },

    /// Every frame in the pool is pinned; no victim can be selected.
    #[error("buffer pool exhausted: all {capacity} frames are pinned")]
    BufferExhausted { capacity: usize },

    /// The file does not exist, already exists, or is in a state that
    /// forbids the operation (e.g. destroying an open file).
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// The page number is out of range or refers to a disposed page.
    #[error("invalid page {page}: {reason}")]
    InvalidPage { page: u32, reason: String },

    /// A slotted-page insertion did not fit, even after compaction.
    #[error("no space on page for a {0}-byte record")]
    NoSpace(usize),

    /// A slot id is out of range or refers to a deleted record.
    #[error("invalid slot {0}")]
    InvalidSlot(u16),

    /// Underlying disk I/O failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration misuse or other storage-level error.
    #[error("storage error: {0}")]
    Storage(String),
}
