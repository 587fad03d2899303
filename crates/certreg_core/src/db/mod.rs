//! SQLite bootstrap for the local node store.
//!
//! # Responsibility
//! - Open and configure SQLite connections backing `SqliteNodeStore`.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No node is read or written before migrations succeed.

use crate::store::{NodePath, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while bringing a node database up to the current schema.
#[derive(Debug)]
pub enum DbError {
    /// Connecting to or configuring `target` failed.
    Open {
        target: String,
        source: rusqlite::Error,
    },
    /// Reading the recorded schema version failed.
    SchemaProbe(rusqlite::Error),
    /// Migration `version` could not be applied; nothing was committed.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    pub(crate) fn open(target: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| Self::Open {
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn migration(version: u32) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Migration { version, source }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { target, source } => {
                write!(f, "failed to open node database `{target}`: {source}")
            }
            Self::SchemaProbe(source) => {
                write!(f, "failed to read node database schema version: {source}")
            }
            Self::Migration { version, source } => {
                write!(f, "node schema migration {version} failed: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "node database schema {db_version} is newer than this build supports ({latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. }
            | Self::SchemaProbe(source)
            | Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

/// Database failures surface to registry callers as backend failures at the
/// store root.
impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        StoreError::Backend {
            path: NodePath::root(),
            message: value.to_string(),
        }
    }
}
