//! In-process `NodeStore` implementation.
//!
//! Used by embedding hosts and tests. Write failures can be injected per
//! node path to exercise compensation paths.

use crate::store::{NodePath, NodeStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<NodePath, Option<String>>,
    failing_writes: BTreeSet<NodePath>,
    writes: u64,
}

/// Map-backed hierarchical store.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    state: Mutex<MemoryState>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set_value` on `path` fail with a backend error.
    pub fn fail_writes_to(&self, path: NodePath) {
        self.state.lock().failing_writes.insert(path);
    }

    pub fn clear_write_failures(&self) {
        self.state.lock().failing_writes.clear();
    }

    /// Returns the current value at `path` without going through the async API.
    pub fn value_at(&self, path: &NodePath) -> Option<String> {
        self.state.lock().nodes.get(path).cloned().flatten()
    }

    pub fn node_exists(&self, path: &NodePath) -> bool {
        self.state.lock().nodes.contains_key(path)
    }

    /// Number of successful `set_value` calls.
    pub fn write_count(&self) -> u64 {
        self.state.lock().writes
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn make_child_node(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath> {
        let path = parent.child(name)?;
        self.state.lock().nodes.entry(path.clone()).or_insert(None);
        Ok(path)
    }

    async fn set_value(&self, node: &NodePath, value: String) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.failing_writes.contains(node) {
            return Err(StoreError::Backend {
                path: node.clone(),
                message: "injected write failure".to_string(),
            });
        }
        let Some(slot) = state.nodes.get_mut(node) else {
            return Err(StoreError::NotFound(node.clone()));
        };
        *slot = Some(value);
        state.writes += 1;
        Ok(())
    }

    async fn get_value(&self, node: &NodePath) -> StoreResult<Option<String>> {
        Ok(self.state.lock().nodes.get(node).cloned().flatten())
    }

    async fn child_names(&self, parent: &NodePath) -> StoreResult<Vec<String>> {
        let state = self.state.lock();
        let names = state
            .nodes
            .keys()
            .filter(|path| path.parent().as_ref() == Some(parent))
            .filter_map(|path| path.name().map(str::to_string))
            .collect();
        Ok(names)
    }
}
