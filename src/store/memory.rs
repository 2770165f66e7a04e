//! In-process hierarchical store.
//!
//! Implements the same namespace semantics the benchmark relies on from a
//! real coordination service (parent must exist, duplicate create fails,
//! delete requires an empty node) without any network, so the engine can be
//! exercised hermetically by the integration tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{CoordinationStore, StoreConnector, StoreError};

#[derive(Default)]
struct Node {
    payload: Vec<u8>,
    children: HashSet<String>,
}

/// Shared in-memory node tree. Cloning yields another handle to the same
/// tree, mirroring how every client session of a real cluster observes one
/// namespace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    nodes: Arc<Mutex<HashMap<String, Node>>>,
}

fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => (None, name),
        Some((parent, name)) => (Some(parent), name),
        None => (None, path),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node directly, without parent checks. Test setup helper.
    pub fn seed(&self, path: &str, payload: &[u8]) {
        let mut nodes = self.nodes.lock().expect("memory store lock poisoned");
        let (parent, name) = split_path(path);
        if let Some(parent_node) = parent.and_then(|p| nodes.get_mut(p)) {
            parent_node.children.insert(name.to_string());
        }
        nodes.insert(
            path.to_string(),
            Node {
                payload: payload.to_vec(),
                children: HashSet::new(),
            },
        );
    }

    /// Number of nodes currently in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().expect("memory store lock poisoned").len()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn create(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        let mut nodes = self.nodes.lock().expect("memory store lock poisoned");
        if nodes.contains_key(path) {
            return Err(StoreError::AlreadyExists);
        }
        let (parent, name) = split_path(path);
        if let Some(parent) = parent {
            match nodes.get_mut(parent) {
                Some(parent_node) => {
                    parent_node.children.insert(name.to_string());
                }
                None => return Err(StoreError::NoSuchNode),
            }
        }
        nodes.insert(
            path.to_string(),
            Node {
                payload: payload.to_vec(),
                children: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), StoreError> {
        let mut nodes = self.nodes.lock().expect("memory store lock poisoned");
        match nodes.get_mut(path) {
            Some(node) => {
                node.payload = payload.to_vec();
                Ok(())
            }
            None => Err(StoreError::NoSuchNode),
        }
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let nodes = self.nodes.lock().expect("memory store lock poisoned");
        nodes
            .get(path)
            .map(|node| node.payload.clone())
            .ok_or(StoreError::NoSuchNode)
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let nodes = self.nodes.lock().expect("memory store lock poisoned");
        nodes
            .get(path)
            .map(|node| node.children.iter().cloned().collect())
            .ok_or(StoreError::NoSuchNode)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut nodes = self.nodes.lock().expect("memory store lock poisoned");
        match nodes.get(path) {
            None => return Err(StoreError::NoSuchNode),
            Some(node) if !node.children.is_empty() => {
                return Err(StoreError::Backend("node has children".to_string()))
            }
            Some(_) => {}
        }
        nodes.remove(path);
        let (parent, name) = split_path(path);
        if let Some(parent_node) = parent.and_then(|p| nodes.get_mut(p)) {
            parent_node.children.remove(name);
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Connector handing out sessions onto one shared in-memory tree.
#[derive(Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn CoordinationStore>, StoreError> {
        Ok(Box::new(self.store.clone()))
    }
}
