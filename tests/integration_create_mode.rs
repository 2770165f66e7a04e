use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use keeper_bench::benchmark::{BenchmarkConfig, BenchmarkRunner};
use keeper_bench::cli::WorkloadMode;
use keeper_bench::metrics::DegenerateRun;
use keeper_bench::store::{CoordinationStore, MemoryStore, StoreConnector, StoreError};

/// Delegates to a shared in-memory tree after a fixed per-operation delay,
/// standing in for a cluster that answers every call in constant time.
struct FixedLatencyStore {
    inner: MemoryStore,
    latency: Duration,
}

#[async_trait]
impl CoordinationStore for FixedLatencyStore {
    async fn create(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        sleep(self.latency).await;
        self.inner.create(path, payload).await
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        sleep(self.latency).await;
        self.inner.set(path, payload).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        sleep(self.latency).await;
        self.inner.get(path).await
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        sleep(self.latency).await;
        self.inner.list_children(path).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        sleep(self.latency).await;
        self.inner.delete(path).await
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

struct FixedLatencyConnector {
    store: MemoryStore,
    latency: Duration,
}

#[async_trait]
impl StoreConnector for FixedLatencyConnector {
    async fn connect(&self) -> Result<Box<dyn CoordinationStore>, StoreError> {
        Ok(Box::new(FixedLatencyStore {
            inner: self.store.clone(),
            latency: self.latency,
        }))
    }
}

fn config(parallel: usize, mode: WorkloadMode, run_duration: Duration) -> BenchmarkConfig {
    BenchmarkConfig {
        nodes: "test:0".to_string(),
        parallel,
        payload_size: 10,
        run_duration,
        mode,
        connect_attempts: 1,
        connect_backoff: Duration::from_millis(1),
    }
}

/// A single worker against an error-free fixed-latency store must complete
/// whole create batches with zero failures (strictly increasing suffixes
/// never collide) and record every latency at or above the injected delay.
#[tokio::test]
async fn create_mode_fixed_latency_store() {
    let store = MemoryStore::new();
    let connector = Arc::new(FixedLatencyConnector {
        store: store.clone(),
        latency: Duration::from_millis(1),
    });

    let runner = BenchmarkRunner::new(config(
        1,
        WorkloadMode::Create,
        Duration::from_millis(50),
    ));
    let stats = runner.run(connector).await.unwrap();

    assert_eq!(stats.failed_requests, 0);
    assert!(stats.total_requests >= 1_000);
    assert_eq!(stats.total_requests % 1_000, 0, "whole batches only");
    // Every call slept at least 1ms, so the distribution sits at or above
    // the 1000us bucket.
    assert!(stats.avg_rt_us >= 1_000, "avg_rt_us = {}", stats.avg_rt_us);
    assert!(stats.tp50_us >= 1_000);
    assert!(stats.tp30_us <= stats.tp50_us);
    assert!(stats.tp50_us <= stats.tp90_us);
    assert!(stats.tp90_us <= stats.tp99_us);
    assert!(stats.tp99_us <= stats.tp999_us);
    assert!(stats.tps > 0);

    // Workers and the coordinator tore their subtrees back down.
    assert_eq!(store.node_count(), 0);
}

/// Two workers write to disjoint subtrees; no cross-worker key collisions.
#[tokio::test]
async fn create_mode_workers_do_not_collide() {
    let connector = Arc::new(FixedLatencyConnector {
        store: MemoryStore::new(),
        latency: Duration::ZERO,
    });

    let runner = BenchmarkRunner::new(config(
        2,
        WorkloadMode::Create,
        Duration::from_millis(100),
    ));
    let stats = runner.run(connector).await.unwrap();

    assert_eq!(stats.failed_requests, 0);
    assert_eq!(stats.parallel, 2);
    assert_eq!(stats.total_requests % 1_000, 0);
}

/// A run that never gets to issue an operation is reported as degenerate,
/// not as a division fault.
#[tokio::test]
async fn zero_duration_run_is_degenerate() {
    let connector = Arc::new(FixedLatencyConnector {
        store: MemoryStore::new(),
        latency: Duration::ZERO,
    });

    let runner = BenchmarkRunner::new(config(1, WorkloadMode::Create, Duration::ZERO));
    let err = runner.run(connector).await.unwrap_err();
    assert!(
        err.chain()
            .any(|cause| cause.downcast_ref::<DegenerateRun>().is_some()),
        "unexpected error: {err:#}"
    );
}
