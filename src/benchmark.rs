//! Benchmark engine: run configuration, the coordinator, and the workers.
//!
//! ## Execution lifecycle
//!
//! 1. The coordinator provisions the shared namespace: the benchmark root
//!    and a well-known list subtree pre-populated with children for the
//!    mixed workload's list requests.
//! 2. One worker task is spawned per configured unit of parallelism. Each
//!    worker connects with its own session, resets its private subtree, and
//!    reports ready.
//! 3. Once every worker has reported ready the coordinator records the
//!    global start timestamp and releases the start gate, so no worker's
//!    timed loop begins before the slowest worker finished setup.
//! 4. Workers issue whole batches of operations until the run deadline,
//!    recording every operation into the shared histogram and counters.
//! 5. The coordinator joins all workers, tears the shared namespace back
//!    down, and reduces the shared state into final statistics.
//!
//! A worker that fails to connect or to reset its subtree reports the error
//! instead of ready; the coordinator then never releases the gate, joins the
//! remaining workers, and aborts the run before any measurement begins.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::cli::{Args, WorkloadMode};
use crate::metrics::{RunMetrics, RunStatistics};
use crate::store::{
    delete_recursive, ensure_created, reset_subtree, CoordinationStore, StoreConnector, StoreError,
};
use crate::utils;

/// Root of everything the benchmark writes.
pub const ROOT_PATH: &str = "/keeper-bench";

/// Shared subtree targeted by mixed-mode list requests. Lives under
/// [`ROOT_PATH`] so the final root teardown covers it as well.
pub const LIST_SUBTREE_PATH: &str = "/keeper-bench/list-request";

/// Children provisioned under the list subtree before any worker starts.
pub const LIST_CHILD_COUNT: usize = 100;

/// Length of each provisioned child's name.
pub const LIST_CHILD_NAME_LEN: usize = 50;

/// Keys per batch iteration. Create mode amplifies this by 100 so both
/// modes issue on the order of a thousand requests between deadline checks.
pub const BATCH_SIZE: usize = 10;

/// Prefix of every generated key name.
pub const KEY_PREFIX: &str = "00";

const SETS_PER_KEY: usize = 8;
const GETS_PER_KEY: usize = 45;
const LISTS_PER_KEY: usize = 45;

/// Immutable configuration for one run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkConfig {
    /// Cluster connection string.
    pub nodes: String,
    /// Number of concurrent workers.
    pub parallel: usize,
    /// Value size in bytes for create and set requests.
    pub payload_size: usize,
    /// Soft deadline for the timed loop.
    pub run_duration: Duration,
    /// Workload shape.
    pub mode: WorkloadMode,
    /// Initial-connection retry budget.
    pub connect_attempts: u32,
    /// Fixed backoff between connection attempts.
    pub connect_backoff: Duration,
}

impl BenchmarkConfig {
    /// Validate CLI arguments into a run configuration.
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.parallel == 0 {
            bail!("--parallel must be at least 1");
        }
        if args.run_duration == 0 {
            bail!("--run_duration must be at least 1 second");
        }
        Ok(Self {
            nodes: args.nodes.clone(),
            parallel: args.parallel,
            payload_size: args.payload_size,
            run_duration: Duration::from_secs(args.run_duration),
            mode: args.mode,
            connect_attempts: args.connect_attempts,
            connect_backoff: crate::defaults::CONNECT_BACKOFF,
        })
    }
}

impl fmt::Display for BenchmarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Benchmark configuration:")?;
        writeln!(f, "  nodes:          {}", self.nodes)?;
        writeln!(f, "  parallel:       {}", self.parallel)?;
        writeln!(f, "  payload_size:   {} bytes", self.payload_size)?;
        writeln!(f, "  run_duration:   {}s", self.run_duration.as_secs())?;
        write!(f, "  mode:           {}", self.mode)
    }
}

/// Shared, read-only run state handed to every worker.
struct RunContext {
    config: BenchmarkConfig,
    payload: Vec<u8>,
    metrics: RunMetrics,
    /// Common time origin; all shared timestamps are microseconds from here.
    epoch: Instant,
}

impl RunContext {
    fn new(config: BenchmarkConfig) -> Self {
        let payload = utils::generate_payload(config.payload_size);
        let metrics = RunMetrics::new(config.parallel);
        Self {
            config,
            payload,
            metrics,
            epoch: Instant::now(),
        }
    }

    fn micros_since_epoch(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

/// Coordinator for one benchmark run.
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    /// Execute the run and return the aggregated statistics.
    pub async fn run(&self, connector: Arc<dyn StoreConnector>) -> Result<RunStatistics> {
        let parallel = self.config.parallel;

        let admin = connector
            .connect()
            .await
            .context("establishing the provisioning session")?;
        info!(
            "provisioning {} and {} children under {}",
            ROOT_PATH, LIST_CHILD_COUNT, LIST_SUBTREE_PATH
        );
        provision_shared_namespace(&*admin)
            .await
            .context("provisioning the shared namespace")?;

        let ctx = Arc::new(RunContext::new(self.config.clone()));
        let (ready_tx, mut ready_rx) = mpsc::channel::<Result<(), StoreError>>(parallel);
        let (gate_tx, gate_rx) = watch::channel(false);

        info!("launching {} workers ({} workload)", parallel, self.config.mode);
        let mut handles = Vec::with_capacity(parallel);
        for id in 0..parallel {
            handles.push(tokio::spawn(worker_main(
                id,
                Arc::clone(&connector),
                Arc::clone(&ctx),
                ready_tx.clone(),
                gate_rx.clone(),
            )));
        }
        drop(ready_tx);
        drop(gate_rx);

        // Rendezvous: every worker must finish setup before any may start.
        let mut setup_error: Option<StoreError> = None;
        for _ in 0..parallel {
            match ready_rx.recv().await {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    setup_error = Some(err);
                    break;
                }
                None => {
                    setup_error =
                        Some(StoreError::Backend("worker exited before rendezvous".into()));
                    break;
                }
            }
        }
        if let Some(err) = setup_error {
            // Never release the gate: parked workers observe the closed
            // channel, skip their timed loop, and clean up after themselves.
            drop(gate_tx);
            for handle in handles {
                let _ = handle.await;
            }
            teardown_shared_namespace(&*admin).await;
            let _ = admin.close().await;
            return Err(anyhow::Error::new(err)
                .context("worker setup failed, aborting before measurement"));
        }

        // All workers are parked at the gate; the release time is the run's
        // global start.
        ctx.metrics.mark_start(ctx.micros_since_epoch());
        if gate_tx.send(true).is_err() {
            bail!("all workers exited before the start signal");
        }
        info!("all {} workers ready, run started", parallel);

        for handle in handles {
            handle.await.context("worker task panicked")?;
        }

        teardown_shared_namespace(&*admin).await;
        let _ = admin.close().await;

        let stats = RunStatistics::compute(parallel, &ctx.metrics)?;
        info!(
            "run complete: {} requests, {} failures, tps {}",
            stats.total_requests, stats.failed_requests, stats.tps
        );
        Ok(stats)
    }
}

/// Create the benchmark root and the list subtree with its fixed children.
async fn provision_shared_namespace(store: &dyn CoordinationStore) -> Result<(), StoreError> {
    ensure_created(store, ROOT_PATH, &[]).await?;
    ensure_created(store, LIST_SUBTREE_PATH, &[]).await?;
    for _ in 0..LIST_CHILD_COUNT {
        let child = format!(
            "{}/{}",
            LIST_SUBTREE_PATH,
            utils::random_node_name(LIST_CHILD_NAME_LEN)
        );
        ensure_created(store, &child, &[]).await?;
    }
    Ok(())
}

/// Best-effort teardown, list subtree first, then the root.
async fn teardown_shared_namespace(store: &dyn CoordinationStore) {
    for path in [LIST_SUBTREE_PATH, ROOT_PATH] {
        if let Err(err) = delete_recursive(store, path).await {
            warn!("cleanup of {} failed: {}", path, err);
        }
    }
}

/// One worker's full lifecycle: connect, reset the private subtree, report
/// ready, park at the gate, run the timed loop, drain, clean up.
async fn worker_main(
    id: usize,
    connector: Arc<dyn StoreConnector>,
    ctx: Arc<RunContext>,
    ready_tx: mpsc::Sender<Result<(), StoreError>>,
    mut gate: watch::Receiver<bool>,
) {
    let store = match connector.connect().await {
        Ok(store) => store,
        Err(err) => {
            let _ = ready_tx.send(Err(err)).await;
            return;
        }
    };

    let work_path = format!("{}/{}", ROOT_PATH, id);
    if let Err(err) = reset_subtree(&*store, &work_path).await {
        let _ = ready_tx.send(Err(err)).await;
        let _ = store.close().await;
        return;
    }

    let _ = ready_tx.send(Ok(())).await;
    if gate.wait_for(|released| *released).await.is_err() {
        // The coordinator aborted the run before releasing the gate.
        debug!("worker {} aborted before start", id);
        let _ = delete_recursive(&*store, &work_path).await;
        let _ = store.close().await;
        return;
    }

    let worker = Worker { id, ctx, work_path };
    worker.run(&*store).await;

    // Best-effort drain: a stale subtree must not block shutdown.
    let _ = delete_recursive(&*store, &worker.work_path).await;
    let _ = store.close().await;
}

struct Worker {
    id: usize,
    ctx: Arc<RunContext>,
    work_path: String,
}

impl Worker {
    /// The timed loop. Whole batches only: the deadline is re-checked
    /// between batches, never mid-operation.
    async fn run(&self, store: &dyn CoordinationStore) {
        let started = Instant::now();
        let deadline = started + self.ctx.config.run_duration;
        let mut next_key: u64 = 0;
        let mut failed_batches: u64 = 0;

        while Instant::now() < deadline {
            let had_failure = match self.ctx.config.mode {
                WorkloadMode::Create => {
                    let (issued, had_failure) = self.create_batch(store, next_key).await;
                    next_key += issued;
                    had_failure
                }
                WorkloadMode::Mix => self.mixed_batch(store).await,
            };
            if had_failure {
                failed_batches += 1;
            }
        }

        let busy_us = started.elapsed().as_micros() as u64;
        self.ctx
            .metrics
            .mark_worker_end(self.id, self.ctx.micros_since_epoch(), busy_us);
        if failed_batches > 0 {
            warn!(
                "worker {} finished with {} batches containing failures",
                self.id, failed_batches
            );
        } else {
            debug!("worker {} finished cleanly", self.id);
        }
    }

    fn key_path(&self, index: u64) -> String {
        format!("{}/{}{}", self.work_path, KEY_PREFIX, index)
    }

    /// Time one operation into the shared histogram and counters,
    /// successful or not.
    async fn timed<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let start = Instant::now();
        let outcome = op.await;
        self.ctx
            .metrics
            .record_request(start.elapsed().as_micros() as u64);
        if outcome.is_err() {
            self.ctx.metrics.record_failure();
        }
        outcome
    }

    /// One create-only batch: `BATCH_SIZE * 100` creates with strictly
    /// increasing key suffixes, so keys are never reused within a run.
    /// Returns the number of keys consumed and whether anything failed.
    async fn create_batch(&self, store: &dyn CoordinationStore, start_key: u64) -> (u64, bool) {
        let mut sample = FailureSample::new(self.id);
        let count = (BATCH_SIZE * 100) as u64;
        for index in start_key..start_key + count {
            let path = self.key_path(index);
            if let Err(err) = self.timed(store.create(&path, &self.ctx.payload)).await {
                sample.note("create", &path, &err);
            }
        }
        (count, sample.any)
    }

    /// One mixed batch: per key one create, 8 sets, 45 gets, 45 list
    /// requests against the shared subtree, one delete. Failures are
    /// counted and swallowed per operation so a missing or duplicated node
    /// never halts the loop.
    async fn mixed_batch(&self, store: &dyn CoordinationStore) -> bool {
        let mut sample = FailureSample::new(self.id);
        for index in 0..BATCH_SIZE as u64 {
            let path = self.key_path(index);
            if let Err(err) = self.timed(store.create(&path, &self.ctx.payload)).await {
                sample.note("create", &path, &err);
            }
            for _ in 0..SETS_PER_KEY {
                if let Err(err) = self.timed(store.set(&path, &self.ctx.payload)).await {
                    sample.note("set", &path, &err);
                }
            }
            for _ in 0..GETS_PER_KEY {
                if let Err(err) = self.timed(store.get(&path)).await {
                    sample.note("get", &path, &err);
                }
            }
            for _ in 0..LISTS_PER_KEY {
                if let Err(err) = self.timed(store.list_children(LIST_SUBTREE_PATH)).await {
                    sample.note("list", LIST_SUBTREE_PATH, &err);
                }
            }
            if let Err(err) = self.timed(store.delete(&path)).await {
                sample.note("delete", &path, &err);
            }
        }
        sample.any
    }
}

/// Logs the first failure of a batch as a diagnostic sample; everything
/// after that is only counted, so sustained failure cannot flood the log.
struct FailureSample {
    worker: usize,
    any: bool,
    logged: bool,
}

impl FailureSample {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            any: false,
            logged: false,
        }
    }

    fn note(&mut self, op: &str, path: &str, err: &StoreError) {
        if !self.logged {
            debug!("worker {}: {} {} failed: {}", self.worker, op, path, err);
            self.logged = true;
        }
        self.any = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn args(extra: &[&str]) -> Args {
        use clap::Parser;
        let mut argv = vec!["keeper-bench", "--nodes", "zk:2181"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_config_rejects_zero_parallel() {
        assert!(BenchmarkConfig::from_args(&args(&["-p", "0"])).is_err());
    }

    #[test]
    fn test_config_rejects_zero_duration() {
        assert!(BenchmarkConfig::from_args(&args(&["-t", "0"])).is_err());
    }

    #[test]
    fn test_config_from_args() {
        let config = BenchmarkConfig::from_args(&args(&["-p", "3", "-t", "2"])).unwrap();
        assert_eq!(config.parallel, 3);
        assert_eq!(config.run_duration, Duration::from_secs(2));
        assert_eq!(config.mode, WorkloadMode::Mix);
    }

    #[tokio::test]
    async fn test_provision_creates_root_list_and_children() {
        let store = MemoryStore::new();
        provision_shared_namespace(&store).await.unwrap();
        assert_eq!(
            store.list_children(LIST_SUBTREE_PATH).await.unwrap().len(),
            LIST_CHILD_COUNT
        );
        // Root, list subtree, and the children.
        assert_eq!(store.node_count(), 2 + LIST_CHILD_COUNT);
    }

    #[tokio::test]
    async fn test_teardown_tolerates_absent_nodes() {
        let store = MemoryStore::new();
        // Nothing was provisioned; teardown must not panic or error out.
        teardown_shared_namespace(&store).await;
        provision_shared_namespace(&store).await.unwrap();
        teardown_shared_namespace(&store).await;
        assert_eq!(store.node_count(), 0);
        teardown_shared_namespace(&store).await;
    }
}
