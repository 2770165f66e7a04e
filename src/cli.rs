use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// keeper-bench - a load-testing benchmark for ZooKeeper-compatible stores
#[derive(Parser, Debug, Clone)]
#[clap(name = "keeper-bench", version, about, long_about = None)]
pub struct Args {
    /// Connection string for the target cluster, such as 'xx1:2181,xx2:2181,xx3:2181'
    #[clap(short = 'c', long)]
    pub nodes: String,

    /// Number of workers issuing requests concurrently
    #[clap(short = 'p', long, default_value_t = crate::defaults::PARALLEL)]
    pub parallel: usize,

    /// Value size in bytes for every create and set request
    #[clap(short = 's', long = "payload_size", default_value_t = crate::defaults::PAYLOAD_SIZE)]
    pub payload_size: usize,

    /// Approximate run duration in seconds
    #[clap(short = 't', long = "run_duration", default_value_t = crate::defaults::RUN_DURATION_SECS)]
    pub run_duration: u64,

    /// Workload mode: 'create' sends only create requests; 'mix' sends
    /// create-1% set-8% get-45% list-45% delete-1%
    #[clap(short = 'm', long, value_enum, default_value_t = WorkloadMode::Mix)]
    pub mode: WorkloadMode,

    /// Connection attempts before giving up on the initial connection
    #[clap(long = "connect_attempts", default_value_t = crate::defaults::CONNECT_ATTEMPTS)]
    pub connect_attempts: u32,

    /// Write the final statistics as JSON to this file
    #[clap(short = 'o', long = "output_file")]
    pub output_file: Option<PathBuf>,
}

/// Workload shape for the timed loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum WorkloadMode {
    /// Only create requests, with monotonically increasing key suffixes
    #[clap(name = "create")]
    Create,

    /// Mixed workload: create-1% set-8% get-45% list-45% delete-1%
    #[clap(name = "mix")]
    Mix,
}

impl std::fmt::Display for WorkloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadMode::Create => write!(f, "create-100%"),
            WorkloadMode::Mix => write!(f, "create-1% set-8% get-45% list-45% delete-1%"),
        }
    }
}
