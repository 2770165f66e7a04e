use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use keeper_bench::benchmark::{BenchmarkConfig, BenchmarkRunner};
use keeper_bench::cli::WorkloadMode;
use keeper_bench::store::{CoordinationStore, MemoryConnector, MemoryStore, StoreConnector, StoreError};

fn config(parallel: usize, run_duration: Duration) -> BenchmarkConfig {
    BenchmarkConfig {
        nodes: "test:0".to_string(),
        parallel,
        payload_size: 100,
        run_duration,
        mode: WorkloadMode::Mix,
        connect_attempts: 1,
        connect_backoff: Duration::from_millis(1),
    }
}

/// Mixed workload against an error-free store: every batch covers all five
/// operation kinds and nothing fails.
#[tokio::test]
async fn mixed_mode_error_free_store() {
    let store = MemoryStore::new();
    let connector = Arc::new(MemoryConnector::new(store.clone()));

    let runner = BenchmarkRunner::new(config(2, Duration::from_millis(100)));
    let stats = runner.run(connector).await.unwrap();

    assert_eq!(stats.failed_requests, 0);
    assert!(stats.total_requests >= 1_000);
    // Each mixed batch issues exactly 10 keys x 100 operations.
    assert_eq!(stats.total_requests % 1_000, 0);
    assert!(stats.tps > 0);
    assert!(stats.tp30_us <= stats.tp50_us);
    assert!(stats.tp999_us >= stats.tp99_us);
    assert_eq!(store.node_count(), 0, "teardown left nodes behind");
}

/// Fails every read, passes everything else through.
struct FailingGetsStore {
    inner: MemoryStore,
}

#[async_trait]
impl CoordinationStore for FailingGetsStore {
    async fn create(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        self.inner.create(path, payload).await
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        self.inner.set(path, payload).await
    }

    async fn get(&self, _path: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::NoSuchNode)
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list_children(path).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.inner.delete(path).await
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

struct FailingGetsConnector {
    store: MemoryStore,
}

#[async_trait]
impl StoreConnector for FailingGetsConnector {
    async fn connect(&self) -> Result<Box<dyn CoordinationStore>, StoreError> {
        Ok(Box::new(FailingGetsStore {
            inner: self.store.clone(),
        }))
    }
}

/// When every get fails, the failure share equals the get share of the mix
/// (45%), and the failed calls are still part of the recorded total.
#[tokio::test]
async fn mixed_mode_failing_gets_are_counted_and_survived() {
    let connector = Arc::new(FailingGetsConnector {
        store: MemoryStore::new(),
    });

    let runner = BenchmarkRunner::new(config(1, Duration::from_millis(100)));
    let stats = runner.run(connector).await.unwrap();

    assert!(stats.total_requests >= 1_000);
    assert_eq!(stats.total_requests % 1_000, 0, "failures halted a batch");
    assert_eq!(
        stats.failed_requests * 100 / stats.total_requests,
        45,
        "failed {} of {}",
        stats.failed_requests,
        stats.total_requests
    );
}
