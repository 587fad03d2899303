//! SQLite-backed `NodeStore` for running the registry outside a host.
//!
//! # Invariants
//! - One row per created node, keyed by its full `/`-joined path.
//! - A node created without a value reads back as `None`.
//! - The connection lock is never held across an await point.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::store::{NodePath, NodeStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Node store persisted in a local SQLite database.
pub struct SqliteNodeStore {
    conn: Mutex<Connection>,
}

impl SqliteNodeStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl NodeStore for SqliteNodeStore {
    async fn make_child_node(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath> {
        let path = parent.child(name)?;
        self.conn
            .lock()
            .execute(
                "INSERT OR IGNORE INTO nodes (path, parent_path, name) VALUES (?1, ?2, ?3);",
                params![path.to_string(), parent.to_string(), name],
            )
            .map_err(|err| backend(&path, err))?;
        Ok(path)
    }

    async fn set_value(&self, node: &NodePath, value: String) -> StoreResult<()> {
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE nodes
                 SET
                    value = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE path = ?2;",
                params![value, node.to_string()],
            )
            .map_err(|err| backend(node, err))?;

        if changed == 0 {
            return Err(StoreError::NotFound(node.clone()));
        }
        Ok(())
    }

    async fn get_value(&self, node: &NodePath) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM nodes WHERE path = ?1;",
                [node.to_string()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map_err(|err| backend(node, err))?;
        Ok(value.flatten())
    }

    async fn child_names(&self, parent: &NodePath) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT name FROM nodes WHERE parent_path = ?1 ORDER BY name ASC;")
            .map_err(|err| backend(parent, err))?;
        let names = stmt
            .query_map([parent.to_string()], |row| row.get::<_, String>(0))
            .map_err(|err| backend(parent, err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| backend(parent, err))?;
        Ok(names)
    }
}

fn backend(path: &NodePath, err: rusqlite::Error) -> StoreError {
    StoreError::Backend {
        path: path.clone(),
        message: err.to_string(),
    }
}
