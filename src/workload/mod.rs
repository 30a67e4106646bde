//! Benchmark workload drivers.
//!
//! Each driver is a pure function from a config struct to CSV rows, built
//! only on the public storage APIs; the binaries under `src/bin/` are thin
//! CLI shims around them.
//!
//! - [`mix`]: random read/write mix over a fixed set of pages
//! - [`load`]: variable-length record loading with periodic deletion and
//!   space-utilization accounting
//! - [`index_cmp`]: index construction in three input orderings plus an
//!   equality-query replay

pub mod index_cmp;
pub mod load;
pub mod mix;

pub use index_cmp::{run_index_comparison, IndexCmpConfig};
pub use load::{run_load, LoadConfig, LoadOutcome};
pub use mix::{run_mix, MixConfig, MixRatio};
