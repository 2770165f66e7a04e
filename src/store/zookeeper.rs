//! ZooKeeper-compatible backend.
//!
//! Wraps the async [`zookeeper_client`] session behind the
//! [`CoordinationStore`] capability set. The benchmark only cares about the
//! five namespace operations and three error signals; everything else the
//! protocol offers (watches, ephemerals, sequentials) is deliberately not
//! surfaced.

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;
use zookeeper_client as zk;

use super::{CoordinationStore, StoreConfig, StoreConnector, StoreError};

/// One client session against a ZooKeeper-compatible cluster.
pub struct ZooKeeperStore {
    client: zk::Client,
}

impl ZooKeeperStore {
    /// Establish a session, retrying with fixed backoff.
    ///
    /// Exhausting the attempt budget is fatal to the run: the caller gets a
    /// `ConnectionFailed` that the binary maps to a dedicated exit code.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let attempts = config.connect_attempts.max(1);
        for attempt in 1..=attempts {
            match zk::Client::connect(&config.nodes).await {
                Ok(client) => return Ok(Self { client }),
                Err(err) if attempt < attempts => {
                    debug!(
                        "connection attempt {}/{} to {} failed: {}",
                        attempt, attempts, config.nodes, err
                    );
                    sleep(config.connect_backoff).await;
                }
                Err(err) => {
                    debug!("final connection attempt to {} failed: {}", config.nodes, err);
                }
            }
        }
        Err(StoreError::ConnectionFailed {
            target: config.nodes.clone(),
            attempts,
        })
    }

    fn create_options() -> zk::CreateOptions<'static> {
        zk::CreateMode::Persistent.with_acls(zk::Acls::anyone_all())
    }
}

fn map_error(err: zk::Error) -> StoreError {
    match err {
        zk::Error::NodeExists => StoreError::AlreadyExists,
        zk::Error::NoNode => StoreError::NoSuchNode,
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl CoordinationStore for ZooKeeperStore {
    async fn create(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        self.client
            .create(path, payload, &Self::create_options())
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        // No version guard: the benchmark always writes unconditionally.
        self.client
            .set_data(path, payload, None)
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.client
            .get_data(path)
            .await
            .map(|(payload, _stat)| payload)
            .map_err(map_error)
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.client.list_children(path).await.map_err(map_error)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.client.delete(path, None).await.map_err(map_error)
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        // The session terminates when the last handle to it is dropped.
        drop(self);
        Ok(())
    }
}

/// Connector producing one fresh session per call, so every worker owns its
/// own connection the way each execution thread of the original tool did.
pub struct ZooKeeperConnector {
    config: StoreConfig,
}

impl ZooKeeperConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for ZooKeeperConnector {
    async fn connect(&self) -> Result<Box<dyn CoordinationStore>, StoreError> {
        let store = ZooKeeperStore::connect(&self.config).await?;
        Ok(Box::new(store))
    }
}
