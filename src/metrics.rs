//! Latency histogram, shared run counters, and post-run statistics.
//!
//! Everything in this module that workers touch during the timed loop is a
//! single atomic increment or store: the histogram buckets, the request and
//! failure counters, the busy-time accumulator, and the per-worker end
//! timestamp slots. There are no locks and no compound read-modify-write
//! sequences, so the measurement path never serializes workers against each
//! other. The aggregation side reads these cells only after every worker has
//! been joined.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Number of latency buckets.
pub const BUCKET_COUNT: usize = 10_000;

/// Latency span of one bucket in microseconds.
pub const BUCKET_WIDTH_US: u64 = 100;

/// Sentinel for the not-yet-recorded global start timestamp.
const START_UNSET: u64 = u64::MAX;

/// Fixed-bucket concurrent latency histogram.
///
/// `record` clamps out-of-range latencies into the last bucket, so every
/// timed operation is accounted for exactly once and the sum of all buckets
/// equals the number of recorded operations. Memory stays O(bucket count)
/// regardless of how many operations a run issues; bucket width trades
/// resolution for that bound.
pub struct LatencyHistogram {
    bucket_width_us: u64,
    buckets: Box<[AtomicU64]>,
}

/// Percentile latencies read out of a histogram scan, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    pub tp30_us: u64,
    pub tp50_us: u64,
    pub tp90_us: u64,
    pub tp99_us: u64,
    pub tp999_us: u64,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self::with_shape(BUCKET_COUNT, BUCKET_WIDTH_US)
    }

    /// Create a histogram with a custom shape. Mostly useful in tests.
    pub fn with_shape(bucket_count: usize, bucket_width_us: u64) -> Self {
        assert!(bucket_count > 0, "histogram needs at least one bucket");
        assert!(bucket_width_us > 0, "bucket width must be non-zero");
        let buckets = (0..bucket_count).map(|_| AtomicU64::new(0)).collect();
        Self {
            bucket_width_us,
            buckets,
        }
    }

    /// Record one operation latency.
    pub fn record(&self, latency_us: u64) {
        let index = ((latency_us / self.bucket_width_us) as usize).min(self.buckets.len() - 1);
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn bucket_width_us(&self) -> u64 {
        self.bucket_width_us
    }

    /// Snapshot of all bucket counters.
    ///
    /// Consistent only up to concurrent-update races; callers take snapshots
    /// after the workers have been joined.
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    /// Total number of recorded operations.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).sum()
    }

    /// Percentile latencies, or `None` when nothing was recorded.
    ///
    /// Single pass in increasing bucket order: a percentile resolves to the
    /// latency of the first bucket whose cumulative fraction reaches the
    /// target. The scan stops as soon as the 99.9th percentile is resolved,
    /// it is the last one needed.
    pub fn percentiles(&self) -> Option<LatencyPercentiles> {
        let counts = self.bucket_counts();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return None;
        }

        let mut tp30 = None;
        let mut tp50 = None;
        let mut tp90 = None;
        let mut tp99 = None;
        let mut tp999 = None;
        let mut cumulative = 0u64;

        for (index, &count) in counts.iter().enumerate() {
            cumulative += count;
            let fraction = cumulative as f64 / total as f64;
            let latency = index as u64 * self.bucket_width_us;
            if tp30.is_none() && fraction >= 0.30 {
                tp30 = Some(latency);
            }
            if tp50.is_none() && fraction >= 0.50 {
                tp50 = Some(latency);
            }
            if tp90.is_none() && fraction >= 0.90 {
                tp90 = Some(latency);
            }
            if tp99.is_none() && fraction >= 0.99 {
                tp99 = Some(latency);
            }
            if fraction >= 0.999 {
                tp999 = Some(latency);
                break;
            }
        }

        // The cumulative fraction reaches 1.0 on the last non-empty bucket,
        // so every percentile is resolved once total > 0.
        Some(LatencyPercentiles {
            tp30_us: tp30.unwrap_or(0),
            tp50_us: tp50.unwrap_or(0),
            tp90_us: tp90.unwrap_or(0),
            tp99_us: tp99.unwrap_or(0),
            tp999_us: tp999.unwrap_or(0),
        })
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared run state mutated concurrently by all workers.
///
/// The end-timestamp slots are partitioned by worker index, so each slot has
/// exactly one writer. The global start timestamp is written exactly once
/// when the coordinator releases the start gate. All timestamps are
/// microseconds since the run-local epoch owned by the coordinator.
pub struct RunMetrics {
    pub histogram: LatencyHistogram,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    busy_time_us: AtomicU64,
    start_time_us: AtomicU64,
    end_times_us: Box<[AtomicU64]>,
}

impl RunMetrics {
    pub fn new(parallel: usize) -> Self {
        let end_times_us = (0..parallel).map(|_| AtomicU64::new(0)).collect();
        Self {
            histogram: LatencyHistogram::new(),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            busy_time_us: AtomicU64::new(0),
            start_time_us: AtomicU64::new(START_UNSET),
            end_times_us,
        }
    }

    /// Record one issued request and its latency, successful or not.
    pub fn record_request(&self, latency_us: u64) {
        self.histogram.record(latency_us);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed request. The latency is recorded separately.
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the global start timestamp. Only the first call wins.
    pub fn mark_start(&self, now_us: u64) -> bool {
        self.start_time_us
            .compare_exchange(START_UNSET, now_us, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record one worker's end timestamp and its busy time.
    pub fn mark_worker_end(&self, worker: usize, end_us: u64, busy_us: u64) {
        self.end_times_us[worker].store(end_us, Ordering::Relaxed);
        self.busy_time_us.fetch_add(busy_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    pub fn busy_time_us(&self) -> u64 {
        self.busy_time_us.load(Ordering::Relaxed)
    }

    pub fn start_time_us(&self) -> Option<u64> {
        match self.start_time_us.load(Ordering::Acquire) {
            START_UNSET => None,
            us => Some(us),
        }
    }

    /// The latest end timestamp across all workers.
    pub fn latest_end_us(&self) -> u64 {
        self.end_times_us
            .iter()
            .map(|t| t.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0)
    }
}

/// A run finished without recording a single operation, so throughput and
/// latency figures are undefined.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("degenerate run: no operations were recorded, statistics are undefined")]
pub struct DegenerateRun;

/// Final aggregated statistics for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub parallel: usize,
    /// Requests per second over the measured wall time.
    pub tps: u64,
    /// Average response time: total busy time over total requests.
    pub avg_rt_us: u64,
    pub tp30_us: u64,
    pub tp50_us: u64,
    pub tp90_us: u64,
    pub tp99_us: u64,
    pub tp999_us: u64,
    /// Latest worker end timestamp minus the global start timestamp.
    pub wall_time_us: u64,
    /// Sum of per-worker busy times.
    pub total_time_us: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
}

impl RunStatistics {
    /// Reduce the shared run state into final statistics.
    ///
    /// Must only be called after every worker has been joined.
    pub fn compute(parallel: usize, metrics: &RunMetrics) -> Result<Self, DegenerateRun> {
        let total_requests = metrics.total_requests();
        let start_us = metrics.start_time_us().ok_or(DegenerateRun)?;
        if total_requests == 0 {
            return Err(DegenerateRun);
        }
        let percentiles = metrics.histogram.percentiles().ok_or(DegenerateRun)?;

        // Sub-microsecond wall times only occur in synthetic tests; clamp so
        // the throughput division stays defined.
        let wall_time_us = metrics.latest_end_us().saturating_sub(start_us).max(1);
        let tps = total_requests.saturating_mul(1_000_000) / wall_time_us;
        let total_time_us = metrics.busy_time_us();
        let avg_rt_us = total_time_us / total_requests;

        Ok(Self {
            parallel,
            tps,
            avg_rt_us,
            tp30_us: percentiles.tp30_us,
            tp50_us: percentiles.tp50_us,
            tp90_us: percentiles.tp90_us,
            tp99_us: percentiles.tp99_us,
            tp999_us: percentiles.tp999_us,
            wall_time_us,
            total_time_us,
            total_requests,
            failed_requests: metrics.failed_requests(),
        })
    }
}
