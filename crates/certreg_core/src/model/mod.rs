//! Record domain model and schema validation.
//!
//! # Responsibility
//! - Define the record kinds, their field schemas and the validated snapshot.
//! - Provide the pure validator every write path runs first.
//!
//! # Invariants
//! - Every record is identified by a `RecordId` that is a valid node name.

pub mod record;
pub mod validation;
