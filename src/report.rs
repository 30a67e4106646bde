//! CSV row schemas for the benchmark harnesses.
//!
//! The column names are a contract consumed by downstream plotting; they
//! are derived from the struct field names, so renaming a field here is a
//! format change.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{PagekitError, Result};

/// One row of the mixed read/write workload CSV.
#[derive(Debug, Clone, Serialize)]
pub struct MixRow {
    pub policy: String,
    pub read_weight: u32,
    pub write_weight: u32,
    pub buffers: usize,
    pub pages: u32,
    pub ops: u64,
    pub logical_reads: u64,
    pub logical_writes: u64,
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub input_count: u64,
    pub output_count: u64,
    pub page_fixes: u64,
    pub dirty_marks: u64,
    pub elapsed_ms: u64,
}

/// One row of the space-utilization CSV.
#[derive(Debug, Clone, Serialize)]
pub struct SpaceRow {
    pub layout: String,
    pub max_record_length: usize,
    pub records: u64,
    pub pages: u64,
    pub space_bytes: u64,
    pub payload_bytes: u64,
    pub utilization: f64,
}

/// One row of the index-construction CSV.
#[derive(Debug, Clone, Serialize)]
pub struct IndexRow {
    pub method: String,
    pub phase: String,
    pub logical_reads: u64,
    pub logical_writes: u64,
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub page_fixes: u64,
    pub dirty_marks: u64,
    pub elapsed_ms: u64,
}

/// Serializes rows as CSV into any writer.
///
/// # Errors
///
/// Returns [`PagekitError::Storage`] if serialization or the underlying
/// write fails.
pub fn write_rows<S: Serialize, W: Write>(writer: W, headers: bool, rows: &[S]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(headers)
        .from_writer(writer);
    for row in rows {
        csv_writer
            .serialize(row)
            .map_err(|e| PagekitError::Storage(format!("CSV serialization failed: {e}")))?;
    }
    csv_writer
        .flush()
        .map_err(|e| PagekitError::Storage(format!("CSV flush failed: {e}")))?;
    Ok(())
}

/// Serializes rows as CSV with headers into a file, or to stdout when no
/// path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be created or a write fails.
pub fn write_rows_to(path: Option<&Path>, rows: &[impl Serialize]) -> Result<()> {
    match path {
        Some(path) => write_rows(std::fs::File::create(path)?, true, rows),
        None => write_rows(std::io::stdout().lock(), true, rows),
    }
}
