//! # keeper-bench
//!
//! A load-testing benchmark for ZooKeeper-compatible coordination services.
//! The harness drives a configurable number of concurrent workers against a
//! target cluster for a fixed duration, issuing a mix of
//! create/set/get/list/delete requests against a hierarchical namespace, and
//! reports throughput and latency-distribution statistics.
//!
//! ## Architecture Overview
//!
//! The crate is organized into the following modules:
//!
//! - `benchmark`: the coordinator and worker engine that executes the run
//! - `cli`: command-line parsing and configuration management
//! - `store`: the coordination-service client abstraction and its backends
//! - `metrics`: the concurrent latency histogram, shared run counters, and
//!   post-run statistics aggregation
//! - `results`: report printing and optional JSON export
//! - `logging`: tracing subscriber setup with colorized output
//! - `utils`: payload and node-name generation helpers
//!
//! ## Measurement Model
//!
//! All workers rendezvous on a start gate after finishing their setup, so no
//! worker begins its timed loop before the slowest worker is ready. Each
//! operation is individually timed into a fixed-bucket histogram shared by
//! all workers through atomic increments only; there are no locks anywhere on
//! the measurement path. Statistics are aggregated strictly after every
//! worker has been joined.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keeper_bench::benchmark::{BenchmarkConfig, BenchmarkRunner};
//! use keeper_bench::store::zookeeper::ZooKeeperConnector;
//! use keeper_bench::store::StoreConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig {
//!         nodes: "127.0.0.1:2181".to_string(),
//!         parallel: 4,
//!         payload_size: 100,
//!         run_duration: std::time::Duration::from_secs(30),
//!         mode: keeper_bench::cli::WorkloadMode::Mix,
//!         connect_attempts: 100,
//!         connect_backoff: std::time::Duration::from_millis(100),
//!     };
//!     let connector = Arc::new(ZooKeeperConnector::new(StoreConfig {
//!         nodes: config.nodes.clone(),
//!         connect_attempts: config.connect_attempts,
//!         connect_backoff: config.connect_backoff,
//!     }));
//!     let runner = BenchmarkRunner::new(config);
//!     let stats = runner.run(connector).await?;
//!     println!("tps: {}", stats.tps);
//!     Ok(())
//! }
//! ```

pub mod benchmark;
pub mod cli;
pub mod logging;
pub mod metrics;
pub mod results;
pub mod store;
pub mod utils;

pub use benchmark::{BenchmarkConfig, BenchmarkRunner};
pub use cli::{Args, WorkloadMode};
pub use metrics::{LatencyHistogram, RunMetrics, RunStatistics};
pub use store::{CoordinationStore, StoreConnector, StoreError};

/// Crate version, embedded in the JSON report for reproducibility.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values.
///
/// These mirror the knobs exposed on the command line; workload-shape
/// constants (batch size, namespace layout) live in `benchmark`.
pub mod defaults {
    use std::time::Duration;

    /// Default number of concurrent workers.
    pub const PARALLEL: usize = 10;

    /// Default value size in bytes for create and set requests.
    pub const PAYLOAD_SIZE: usize = 100;

    /// Default run duration in seconds.
    ///
    /// One minute is long enough for throughput to stabilize against a real
    /// cluster while keeping ad-hoc runs cheap.
    pub const RUN_DURATION_SECS: u64 = 60;

    /// Connection attempts before the run is aborted.
    pub const CONNECT_ATTEMPTS: u32 = 100;

    /// Fixed backoff between connection attempts.
    pub const CONNECT_BACKOFF: Duration = Duration::from_millis(100);
}
