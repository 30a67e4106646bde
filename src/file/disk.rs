//! Raw page I/O on a single paged file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::PAGE_SIZE;

/// Byte-level access to one paged file.
///
/// The disk file knows nothing about headers, free lists, or the buffer
/// pool; it reads and writes whole pages at fixed offsets. Reads past the
/// current end of the file yield zeroed pages, which is how freshly
/// extended pages look before their first write-back.
#[derive(Debug)]
pub struct DiskFile {
    /// Path to the paged file.
    path: PathBuf,
    /// Underlying OS file handle.
    file: File,
}

impl DiskFile {
    /// Creates a new paged file; fails if the path already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Opens an existing paged file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the path this file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads one page into `buf`.
    ///
    /// A page beyond the current file length reads as zeros.
    ///
    /// # Errors
    ///
    /// Returns an error if the seek or read fails.
    pub fn read_page(&mut self, page_no: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        self.file
            .seek(SeekFrom::Start(u64::from(page_no) * PAGE_SIZE as u64))?;
        match self.file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                buf.fill(0);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes one page from `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the seek or write fails.
    pub fn write_page(&mut self, page_no: u32, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        self.file
            .seek(SeekFrom::Start(u64::from(page_no) * PAGE_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Flushes all buffered writes to the OS and the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
