//! Core registry logic for capability-gated record publishing.
//! This crate is the single source of truth for registry invariants.

pub mod capability;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod quota;
pub mod store;

pub use capability::error::{AmendRejected, RegistryError, RegistryResult, RestoreError};
pub use capability::issuer::{IssuerSnapshot, Published, RecordIssuer};
pub use capability::session::{Session, SessionError, SessionId, SessionOutcome, SessionState};
pub use capability::token::{ContinuingCapability, CreateCapability, GrantId, IssuerId};
pub use config::{RegistryTerms, TermsError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Record, RecordDecodeError, RecordId, RecordKind, RecordSchema};
pub use model::validation::{validate_against, ValidationError, IMAGE_DATA_URI_PREFIX};
pub use quota::tracker::{QuotaTracker, Reservation, ReserveError, TrackerSnapshot};
pub use store::memory::MemoryNodeStore;
pub use store::record_store::{NodeHandle, RecordStore};
pub use store::sqlite::SqliteNodeStore;
pub use store::{is_valid_node_name, NodePath, NodeStore, StoreError, StoreResult};

/// Validates raw input for `kind` without touching any registry state.
pub fn validate(raw: &serde_json::Value, kind: RecordKind) -> Result<(), ValidationError> {
    validate_against(raw, kind.schema())
}

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping, validate, RecordKind};
    use serde_json::json;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn validate_uses_kind_schema() {
        assert!(validate(&json!({"patientId": "P1"}), RecordKind::MedicalRecord).is_err());
    }
}
