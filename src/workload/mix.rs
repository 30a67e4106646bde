//! Random read/write page workload.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::buffer::{BufferPool, ReplacementPolicy, DEFAULT_POOL_SIZE};
use crate::error::{PagekitError, Result};
use crate::file::{FileManager, PageNo};
use crate::report::MixRow;

/// Read:write weighting, parsed from `R:W` (e.g. `8:2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixRatio {
    pub read: u32,
    pub write: u32,
}

impl FromStr for MixRatio {
    type Err = PagekitError;

    fn from_str(s: &str) -> Result<Self> {
        let (read, write) = s
            .split_once(':')
            .ok_or_else(|| PagekitError::Storage(format!("mix '{s}' is not of the form R:W")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| PagekitError::Storage(format!("mix '{s}' is not of the form R:W")))
        };
        let ratio = Self {
            read: parse(read)?,
            write: parse(write)?,
        };
        if ratio.read + ratio.write == 0 {
            return Err(PagekitError::Storage("mix weights must not both be zero".into()));
        }
        Ok(ratio)
    }
}

impl std::fmt::Display for MixRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.read, self.write)
    }
}

/// Parameters of the mixed workload.
#[derive(Debug, Clone)]
pub struct MixConfig {
    /// Scratch paged file; recreated on every run.
    pub file: PathBuf,
    /// Number of data pages to spread the accesses over.
    pub pages: u32,
    /// Number of page operations to issue.
    pub ops: u64,
    /// Buffer pool capacity in frames.
    pub buffers: usize,
    pub policy: ReplacementPolicy,
    pub mix: MixRatio,
    pub seed: u64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("mix.pf"),
            pages: 400,
            ops: 10_000,
            buffers: DEFAULT_POOL_SIZE,
            policy: ReplacementPolicy::Lru,
            mix: MixRatio { read: 8, write: 2 },
            seed: 42,
        }
    }
}

/// Runs the mixed workload and returns its CSV row.
///
/// The file is created and extended to `pages` data pages, each stamped
/// with its workload index; the statistics are reset after this setup so
/// the row reflects only the measured operations.
///
/// # Errors
///
/// Propagates the first storage failure.
pub fn run_mix(config: &MixConfig) -> Result<MixRow> {
    if config.pages == 0 || config.ops == 0 {
        return Err(PagekitError::Storage(
            "mix workload needs at least one page and one operation".into(),
        ));
    }

    let pool = BufferPool::new(config.buffers);
    pool.set_default_policy(config.policy)?;
    let manager = FileManager::new(pool);

    if config.file.exists() {
        manager.destroy(&config.file)?;
    }
    manager.create(&config.file)?;
    let handle = manager.open(&config.file)?;

    let mut page_nos: Vec<PageNo> = Vec::with_capacity(config.pages as usize);
    for index in 0..config.pages {
        let (page_no, frame) = manager.alloc_page(handle)?;
        frame.data_mut()[0..4].copy_from_slice(&index.to_le_bytes());
        drop(frame);
        manager.unfix_page(handle, page_no, true)?;
        page_nos.push(page_no);
    }
    debug!(pages = config.pages, "mix workload file prepared");

    let stats = manager.stats();
    stats.reset();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let started = Instant::now();

    for op in 0..config.ops {
        let page_no = page_nos[rng.gen_range(0..page_nos.len())];
        let is_read = rng.gen_ratio(config.mix.read, config.mix.read + config.mix.write);
        let frame = manager.get_this_page(handle, page_no)?;
        if is_read {
            let _first_word = u32::from_le_bytes(
                frame.data()[0..4].try_into().expect("4-byte slice"),
            );
            drop(frame);
            manager.unfix_page(handle, page_no, false)?;
        } else {
            frame.data_mut()[0..4].copy_from_slice(&(op as u32).to_le_bytes());
            drop(frame);
            manager.unfix_page(handle, page_no, true)?;
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let snap = stats.snapshot();
    manager.close(handle)?;

    Ok(MixRow {
        policy: config.policy.to_string(),
        read_weight: config.mix.read,
        write_weight: config.mix.write,
        buffers: config.buffers,
        pages: config.pages,
        ops: config.ops,
        logical_reads: snap.logical_reads,
        logical_writes: snap.logical_writes,
        physical_reads: snap.physical_reads,
        physical_writes: snap.physical_writes,
        input_count: snap.input_count,
        output_count: snap.output_count,
        page_fixes: snap.page_fixes,
        dirty_marks: snap.dirty_marks,
        elapsed_ms,
    })
}
