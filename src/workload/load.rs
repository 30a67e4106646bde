//! Variable-length record loader with space-utilization accounting.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::buffer::{BufferPool, DEFAULT_POOL_SIZE};
use crate::error::{PagekitError, Result};
use crate::file::FileManager;
use crate::report::SpaceRow;
use crate::slotted::{SlottedPage, MAX_RECORD_SIZE};
use crate::PAGE_SIZE;

/// Parameters of the record-loading workload.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Text dataset; one record per line.
    pub data: PathBuf,
    /// Paged file to build; recreated on every run.
    pub out: PathBuf,
    /// Delete every k-th record in scan order after loading, if set.
    pub delete_step: Option<u64>,
    /// Record lengths for the hypothetical fixed-width comparison rows.
    pub static_lens: Vec<usize>,
}

/// What the loader observed, plus the CSV rows it produced.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub rows: Vec<SpaceRow>,
    pub records_loaded: u64,
    pub records_deleted: u64,
    pub live_records: u64,
    pub data_pages: u64,
}

/// Loads the dataset, optionally deletes every k-th record, and reports
/// slotted versus hypothetical fixed-width utilization.
///
/// Lines are whitespace-trimmed; lines that do not start with an ASCII
/// digit are skipped. Every accepted line must fit an empty page.
///
/// # Errors
///
/// Propagates the first storage failure; an over-long record is an error.
pub fn run_load(config: &LoadConfig) -> Result<LoadOutcome> {
    let manager = FileManager::new(BufferPool::new(DEFAULT_POOL_SIZE));
    if config.out.exists() {
        manager.destroy(&config.out)?;
    }
    manager.create(&config.out)?;
    let handle = manager.open(&config.out)?;

    // Load phase: pack records into the current page, moving on when full.
    // Exactly one page stays pinned at a time.
    let reader = BufReader::new(File::open(&config.data)?);
    let mut records_loaded = 0u64;
    let mut current = None;

    for line in reader.lines() {
        let line = line?;
        let record = line.trim();
        if !record.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        let record = record.as_bytes();
        if record.len() > MAX_RECORD_SIZE {
            return Err(PagekitError::NoSpace(record.len()));
        }

        if current.is_none() {
            let (page_no, frame) = manager.alloc_page(handle)?;
            SlottedPage::new(&mut frame.data_mut()[..]).init();
            current = Some((page_no, frame));
        }
        let (page_no, frame) = current.clone().expect("current page exists");

        let inserted = {
            let mut data = frame.data_mut();
            SlottedPage::new(&mut data[..]).insert(record)
        };
        match inserted {
            Ok(_) => records_loaded += 1,
            Err(PagekitError::NoSpace(_)) => {
                // Retire the full page and retry on a fresh one; a bounded
                // record always fits an empty page.
                drop(frame);
                manager.unfix_page(handle, page_no, true)?;
                let (fresh, frame) = manager.alloc_page(handle)?;
                {
                    let mut data = frame.data_mut();
                    let mut page = SlottedPage::new(&mut data[..]);
                    page.init();
                    page.insert(record)?;
                }
                current = Some((fresh, frame));
                records_loaded += 1;
            }
            Err(e) => return Err(e),
        }
    }
    if let Some((page_no, frame)) = current {
        drop(frame);
        manager.unfix_page(handle, page_no, true)?;
    }
    debug!(records = records_loaded, "load phase complete");

    // Deletion phase: every k-th record in global scan order.
    let mut records_deleted = 0u64;
    if let Some(step) = config.delete_step {
        if step > 0 {
            let mut position = 0u64;
            let mut scan = manager.scan(handle);
            while let Some((_, frame)) = scan.next()? {
                let mut data = frame.data_mut();
                let mut page = SlottedPage::new(&mut data[..]);
                let slots: Vec<_> = page.records().map(|(slot, _)| slot).collect();
                let mut deleted_here = false;
                for slot in slots {
                    if position % step == 0 {
                        page.delete(slot)?;
                        records_deleted += 1;
                        deleted_here = true;
                    }
                    position += 1;
                }
                drop(data);
                drop(frame);
                scan.unfix_current(deleted_here)?;
            }
            debug!(deleted = records_deleted, step, "deletion phase complete");
        }
    }

    // Accounting phase: tally the survivors.
    let mut live_records = 0u64;
    let mut payload_bytes = 0u64;
    let mut max_record_length = 0usize;
    let mut data_pages = 0u64;
    {
        let mut scan = manager.scan(handle);
        while let Some((_, frame)) = scan.next()? {
            data_pages += 1;
            let mut data = frame.data_mut();
            let page = SlottedPage::new(&mut data[..]);
            for (_, record) in page.records() {
                live_records += 1;
                payload_bytes += record.len() as u64;
                max_record_length = max_record_length.max(record.len());
            }
            drop(data);
            drop(frame);
            scan.unfix_current(false)?;
        }
    }
    manager.close(handle)?;

    let mut rows = Vec::with_capacity(1 + config.static_lens.len());
    let space_bytes = data_pages * PAGE_SIZE as u64;
    rows.push(SpaceRow {
        layout: "slotted".into(),
        max_record_length,
        records: live_records,
        pages: data_pages,
        space_bytes,
        payload_bytes,
        utilization: utilization(payload_bytes, space_bytes),
    });

    for &len in &config.static_lens {
        let per_page = PAGE_SIZE / len.max(1);
        if len == 0 || per_page == 0 {
            warn!(len, "skipping static layout that cannot hold a record per page");
            continue;
        }
        let pages = live_records.div_ceil(per_page as u64);
        let space = pages * PAGE_SIZE as u64;
        let payload = live_records * len as u64;
        rows.push(SpaceRow {
            layout: "static".into(),
            max_record_length: len,
            records: live_records,
            pages,
            space_bytes: space,
            payload_bytes: payload,
            utilization: utilization(payload, space),
        });
    }

    Ok(LoadOutcome {
        rows,
        records_loaded,
        records_deleted,
        live_records,
        data_pages,
    })
}

fn utilization(payload: u64, space: u64) -> f64 {
    if space == 0 {
        0.0
    } else {
        payload as f64 / space as f64
    }
}
