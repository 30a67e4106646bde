//! Index-construction comparison harness.
//!
//! Builds the same index from three input orderings, replays one query
//! sample against each, and writes six CSV rows to `--metrics` (or stdout).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pagekit::buffer::{ReplacementPolicy, DEFAULT_POOL_SIZE};
use pagekit::report;
use pagekit::workload::{run_index_comparison, IndexCmpConfig};

/// Compare index construction orderings.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Dataset of `;`-separated records
    #[arg(long)]
    data: PathBuf,

    /// Base name of the index file (the key field number is appended)
    #[arg(long, default_value = "relation")]
    rel_base: String,

    /// Metrics CSV path; stdout when omitted
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Number of equality queries to replay per ordering
    #[arg(long, default_value_t = 500)]
    queries: usize,

    /// Buffer pool capacity in frames
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    buffers: usize,

    /// Replacement policy: lru or mru
    #[arg(long, default_value = "lru")]
    policy: ReplacementPolicy,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = IndexCmpConfig {
        data: args.data,
        rel_base: args.rel_base,
        queries: args.queries,
        buffers: args.buffers,
        policy: args.policy,
    };

    let rows = match run_index_comparison(&config) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("index-bench: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = report::write_rows_to(args.metrics.as_deref(), &rows) {
        eprintln!("index-bench: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
