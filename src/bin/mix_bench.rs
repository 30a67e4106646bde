//! Mixed read/write buffer workload harness.
//!
//! Emits one CSV row on stdout; pass `--header` to prepend the column row.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pagekit::buffer::{ReplacementPolicy, DEFAULT_POOL_SIZE};
use pagekit::report;
use pagekit::workload::{run_mix, MixConfig, MixRatio};

/// Drive a random read/write mix against one paged file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scratch paged file (recreated on every run)
    #[arg(long)]
    file: PathBuf,

    /// Number of data pages to spread the accesses over
    #[arg(long, default_value_t = 400)]
    pages: u32,

    /// Number of page operations to issue
    #[arg(long, default_value_t = 10_000)]
    ops: u64,

    /// Buffer pool capacity in frames
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    buffers: usize,

    /// Replacement policy: lru or mru
    #[arg(long, default_value = "lru")]
    policy: ReplacementPolicy,

    /// Read:write weighting, e.g. 8:2
    #[arg(long, default_value = "8:2")]
    mix: MixRatio,

    /// Seed for the operation sequence
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the CSV header row before the data row
    #[arg(long)]
    header: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = MixConfig {
        file: args.file,
        pages: args.pages,
        ops: args.ops,
        buffers: args.buffers,
        policy: args.policy,
        mix: args.mix,
        seed: args.seed,
    };

    let row = match run_mix(&config) {
        Ok(row) => row,
        Err(e) => {
            eprintln!("mix-bench: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = report::write_rows(std::io::stdout().lock(), args.header, &[row]) {
        eprintln!("mix-bench: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
