//! keeper-bench entry point.
//!
//! Wires the CLI, logging, the ZooKeeper backend, and the benchmark runner
//! together. Exit codes: 0 on a completed run, 2 when the initial
//! connection budget is exhausted, 1 for any other failure (including a run
//! that recorded no operations).

use clap::Parser;
use keeper_bench::benchmark::{BenchmarkConfig, BenchmarkRunner};
use keeper_bench::cli::Args;
use keeper_bench::store::{StoreConfig, StoreError, ZooKeeperConnector};
use keeper_bench::{logging, results};
use std::sync::Arc;
use tracing::error;

const EXIT_FAILURE: i32 = 1;
const EXIT_CONNECTION_FAILED: i32 = 2;

#[tokio::main]
async fn main() {
    logging::init();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("benchmark failed: {:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = BenchmarkConfig::from_args(&args)?;
    results::print_config(&config);

    let connector = Arc::new(ZooKeeperConnector::new(StoreConfig {
        nodes: config.nodes.clone(),
        connect_attempts: config.connect_attempts,
        connect_backoff: config.connect_backoff,
    }));

    let runner = BenchmarkRunner::new(config.clone());
    let stats = runner.run(connector).await?;

    results::print_report(&stats);
    if let Some(path) = &args.output_file {
        results::write_json_report(path, &config, &stats)?;
    }
    Ok(())
}

/// Connection exhaustion gets its own exit code so scripted runs can tell a
/// dead cluster apart from every other failure.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    let connection_failed = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StoreError>(),
            Some(StoreError::ConnectionFailed { .. })
        )
    });
    if connection_failed {
        EXIT_CONNECTION_FAILED
    } else {
        EXIT_FAILURE
    }
}
