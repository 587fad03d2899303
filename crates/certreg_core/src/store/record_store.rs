//! Record store adapter over a `NodeStore`.
//!
//! # Responsibility
//! - Resolve a record ID to its `namespace/recordId` node.
//! - Serialize record snapshots to JSON strings and back.
//!
//! # Invariants
//! - `ensure_node` is idempotent.
//! - Errors are returned unmodified; no retry and no validation recovery.

use crate::model::record::{Record, RecordId, RecordKind};
use crate::store::{NodePath, NodeStore, StoreError, StoreResult};
use log::debug;

/// Resolved location of one record in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    id: RecordId,
    path: NodePath,
}

impl NodeHandle {
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }
}

/// Adapter mapping records of one kind into one namespace.
pub struct RecordStore<S: NodeStore> {
    store: S,
    namespace: NodePath,
    kind: RecordKind,
}

impl<S: NodeStore> RecordStore<S> {
    pub fn new(store: S, namespace: NodePath, kind: RecordKind) -> Self {
        Self {
            store,
            namespace,
            kind,
        }
    }

    pub fn namespace(&self) -> &NodePath {
        &self.namespace
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Returns the underlying node store.
    pub fn node_store(&self) -> &S {
        &self.store
    }

    /// Resolves the node for `id` without creating it.
    pub fn locate(&self, id: &RecordId) -> StoreResult<NodeHandle> {
        Ok(NodeHandle {
            id: id.clone(),
            path: self.namespace.child(id.as_str())?,
        })
    }

    /// Creates-or-returns the node for `id` under the namespace.
    pub async fn ensure_node(&self, id: &RecordId) -> StoreResult<NodeHandle> {
        let path = self
            .store
            .make_child_node(&self.namespace, id.as_str())
            .await?;
        Ok(NodeHandle {
            id: id.clone(),
            path,
        })
    }

    /// Returns whether `node` already holds a record snapshot.
    pub async fn is_occupied(&self, node: &NodeHandle) -> StoreResult<bool> {
        Ok(self.store.get_value(&node.path).await?.is_some())
    }

    /// Lists IDs of every record stored under the namespace. Nodes that were
    /// created but never written are skipped.
    pub async fn stored_ids(&self) -> StoreResult<Vec<RecordId>> {
        let mut ids = Vec::new();
        for name in self.store.child_names(&self.namespace).await? {
            let node = self.locate(&RecordId::from(name))?;
            if self.is_occupied(&node).await? {
                ids.push(node.id);
            }
        }
        Ok(ids)
    }

    /// Serializes `record` and stores it at `node`.
    pub async fn write(&self, node: &NodeHandle, record: &Record) -> StoreResult<()> {
        let encoded = record
            .to_json_string()
            .map_err(|err| StoreError::Encode(err.to_string()))?;
        let bytes = encoded.len();
        self.store.set_value(&node.path, encoded).await?;
        debug!(
            "event=record_write module=store status=ok path={} bytes={}",
            node.path, bytes
        );
        Ok(())
    }

    /// Reads and decodes the record stored at `node`.
    pub async fn read(&self, node: &NodeHandle) -> StoreResult<Record> {
        let Some(value) = self.store.get_value(&node.path).await? else {
            return Err(StoreError::NotFound(node.path.clone()));
        };
        Record::from_json_str(self.kind, &value).map_err(|err| StoreError::Corrupt {
            path: node.path.clone(),
            message: err.to_string(),
        })
    }
}
