//! Record-loading and space-utilization harness.
//!
//! Loads a text dataset into a slotted-page file, optionally deletes every
//! k-th record, and writes the utilization CSV to `--metrics` (or stdout).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pagekit::report;
use pagekit::workload::{run_load, LoadConfig};

/// Load variable-length records and compare layouts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Text dataset, one record per line
    #[arg(long)]
    data: PathBuf,

    /// Paged file to build (recreated on every run)
    #[arg(long)]
    out: PathBuf,

    /// Delete every k-th record in scan order after loading
    #[arg(long, conflicts_with = "no_delete")]
    delete_step: Option<u64>,

    /// Skip the deletion pass entirely
    #[arg(long)]
    no_delete: bool,

    /// Metrics CSV path; stdout when omitted
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Record lengths for the hypothetical fixed-width comparison
    #[arg(long, value_delimiter = ',', default_values_t = [64usize, 128, 256])]
    static_lens: Vec<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = LoadConfig {
        data: args.data,
        out: args.out,
        delete_step: if args.no_delete { None } else { args.delete_step },
        static_lens: args.static_lens,
    };

    let outcome = match run_load(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("load-bench: {e}");
            return ExitCode::FAILURE;
        }
    };
    eprintln!(
        "loaded {} records, deleted {}, {} live on {} pages",
        outcome.records_loaded, outcome.records_deleted, outcome.live_records, outcome.data_pages
    );
    if let Err(e) = report::write_rows_to(args.metrics.as_deref(), &outcome.rows) {
        eprintln!("load-bench: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
