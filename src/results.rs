//! Report output.
//!
//! The configuration echo and the CSV result block go to stdout so they stay
//! machine-parsable independent of the log filter. The same statistics can
//! additionally be exported as JSON for downstream tooling.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::benchmark::BenchmarkConfig;
use crate::metrics::RunStatistics;
use crate::utils::format_micros;

/// Header of the CSV result line. All latency figures are microseconds.
pub const CSV_HEADER: &str = "parallel,tps,avgRT(us),TP90(us),TP99(us),TP999(us),wall_time(us),total_time(us),total_request,fail_request";

/// Render the CSV data row for one run.
pub fn csv_row(stats: &RunStatistics) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{}",
        stats.parallel,
        stats.tps,
        stats.avg_rt_us,
        stats.tp90_us,
        stats.tp99_us,
        stats.tp999_us,
        stats.wall_time_us,
        stats.total_time_us,
        stats.total_requests,
        stats.failed_requests,
    )
}

/// Print the configuration echo.
pub fn print_config(config: &BenchmarkConfig) {
    println!();
    println!("{}", config);
    println!();
}

/// Print the result block: a header line and one CSV data row.
pub fn print_report(stats: &RunStatistics) {
    info!(
        "latency summary: avg {} / p50 {} / p99 {}",
        format_micros(stats.avg_rt_us),
        format_micros(stats.tp50_us),
        format_micros(stats.tp99_us)
    );
    println!();
    println!("Benchmark result (time measured in microseconds):");
    println!("{}", CSV_HEADER);
    println!("{}", csv_row(stats));
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    config: &'a BenchmarkConfig,
    statistics: &'a RunStatistics,
}

/// Write the full statistics as pretty JSON.
pub fn write_json_report(
    path: &Path,
    config: &BenchmarkConfig,
    stats: &RunStatistics,
) -> Result<()> {
    let report = JsonReport {
        version: crate::VERSION,
        timestamp: chrono::Utc::now(),
        config,
        statistics: stats,
    };
    let json = serde_json::to_string_pretty(&report).context("serializing the JSON report")?;
    std::fs::write(path, json)
        .with_context(|| format!("writing the JSON report to {}", path.display()))?;
    info!("results written to {}", path.display());
    Ok(())
}
