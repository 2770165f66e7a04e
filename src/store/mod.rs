//! Coordination-service client abstraction.
//!
//! The benchmark never touches a wire protocol directly. Workers and the
//! coordinator consume the small capability set below; backends live in
//! submodules behind the same trait. `zookeeper` wraps a real client
//! session, `memory` is an in-process tree used by the integration tests.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod zookeeper;

pub use memory::{MemoryConnector, MemoryStore};
pub use zookeeper::{ZooKeeperConnector, ZooKeeperStore};

/// Errors surfaced by a coordination-service backend.
///
/// Only the signals the benchmark reacts to are distinguished; everything
/// else is a generic backend failure that is counted and sampled but never
/// interpreted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node already exists")]
    AlreadyExists,

    #[error("no such node")]
    NoSuchNode,

    #[error("failed to connect to {target} after {attempts} attempts")]
    ConnectionFailed { target: String, attempts: u32 },

    #[error("coordination service failure: {0}")]
    Backend(String),
}

/// Connection settings for a backend.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Cluster connection string, e.g. `host1:2181,host2:2181`.
    pub nodes: String,
    /// Attempts before the initial connection is declared dead.
    pub connect_attempts: u32,
    /// Fixed backoff between attempts.
    pub connect_backoff: Duration,
}

/// Capability set consumed by workers and the coordinator: five operations
/// over a hierarchical namespace plus session close.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Create a node with the given payload. Fails with `AlreadyExists` if
    /// the node is present and `NoSuchNode` if its parent is missing.
    async fn create(&self, path: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// Replace a node's payload.
    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// Read a node's payload.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// List the names of a node's direct children.
    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Delete a node. The node must have no children.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Release the session. Backends may defer teardown to drop.
    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Produces fresh client sessions for workers and the coordinator.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn CoordinationStore>, StoreError>;
}

/// Create a node, treating an already-present node as success.
pub async fn ensure_created(
    store: &dyn CoordinationStore,
    path: &str,
    payload: &[u8],
) -> Result<(), StoreError> {
    match store.create(path, payload).await {
        Ok(()) | Err(StoreError::AlreadyExists) => Ok(()),
        Err(err) => Err(err),
    }
}

/// Delete a subtree, children first.
///
/// A node that is already absent counts as deleted, so concurrent or
/// repeated cleanups of the same subtree are harmless.
pub async fn delete_recursive(
    store: &dyn CoordinationStore,
    path: &str,
) -> Result<(), StoreError> {
    // Pre-order walk; reversing it yields every node before its ancestors.
    let mut pending = vec![path.to_string()];
    let mut ordered = Vec::new();
    while let Some(current) = pending.pop() {
        match store.list_children(&current).await {
            Ok(children) => {
                for child in children {
                    pending.push(format!("{}/{}", current, child));
                }
                ordered.push(current);
            }
            Err(StoreError::NoSuchNode) => {}
            Err(err) => return Err(err),
        }
    }
    for node in ordered.iter().rev() {
        match store.delete(node).await {
            Ok(()) | Err(StoreError::NoSuchNode) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Ensure `path` exists and is empty.
///
/// A subtree surviving from a previous run is wiped and the node recreated,
/// which also resets any child-version state the backend keeps on it. The
/// wipe and re-create are best-effort; a concurrent cleanup racing with this
/// one must not abort worker setup.
pub async fn reset_subtree(store: &dyn CoordinationStore, path: &str) -> Result<(), StoreError> {
    match store.create(path, &[]).await {
        Ok(()) => Ok(()),
        Err(StoreError::AlreadyExists) => {
            let _ = delete_recursive(store, path).await;
            match store.create(path, &[]).await {
                Ok(()) | Err(StoreError::AlreadyExists) => Ok(()),
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_tree() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed("/bench", &[]);
        store.seed("/bench/a", &[1]);
        store.seed("/bench/a/x", &[2]);
        store.seed("/bench/a/y", &[3]);
        store.seed("/bench/b", &[4]);
        store
    }

    #[tokio::test]
    async fn test_delete_recursive_removes_subtree() {
        let store = store_with_tree();
        delete_recursive(&store, "/bench/a").await.unwrap();
        assert!(matches!(
            store.get("/bench/a").await,
            Err(StoreError::NoSuchNode)
        ));
        // Sibling is untouched.
        assert_eq!(store.get("/bench/b").await.unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_delete_recursive_is_idempotent() {
        let store = store_with_tree();
        delete_recursive(&store, "/bench/a").await.unwrap();
        // Deleting an already-absent subtree is success, not an error.
        delete_recursive(&store, "/bench/a").await.unwrap();
        delete_recursive(&store, "/never/existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_created_tolerates_existing_node() {
        let store = MemoryStore::new();
        ensure_created(&store, "/bench", &[]).await.unwrap();
        ensure_created(&store, "/bench", &[]).await.unwrap();
        assert_eq!(store.get("/bench").await.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_reset_subtree_creates_fresh_node() {
        let store = MemoryStore::new();
        reset_subtree(&store, "/bench").await.unwrap();
        assert!(store.list_children("/bench").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_subtree_wipes_previous_run() {
        let store = store_with_tree();
        reset_subtree(&store, "/bench/a").await.unwrap();
        let children = store.list_children("/bench/a").await.unwrap();
        assert!(children.is_empty(), "stale children survived: {children:?}");
    }
}
