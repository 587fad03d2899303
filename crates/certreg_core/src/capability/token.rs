//! Capability values handed to the host.
//!
//! Capabilities are plain data: the issuer they came from, and for a
//! continuing capability the record it is bound to plus the current grant.
//! Authority comes from the issuer checking these against its own state,
//! so a copied or stale value grants nothing.

use crate::model::record::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identity of one issuer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuerId(Uuid);

impl IssuerId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for IssuerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Current amendment grant for one record. Rotated on every amendment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(Uuid);

impl GrantId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Unscoped right to register new records. Reusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCapability {
    issuer: IssuerId,
}

impl CreateCapability {
    pub(crate) fn new(issuer: IssuerId) -> Self {
        Self { issuer }
    }

    pub fn issuer(&self) -> IssuerId {
        self.issuer
    }
}

/// Right to amend exactly one record.
///
/// Consumed by every exercise; a successful amendment returns a freshly
/// minted replacement and invalidates this one.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuingCapability {
    issuer: IssuerId,
    bound_id: RecordId,
    grant: GrantId,
}

impl ContinuingCapability {
    pub(crate) fn new(issuer: IssuerId, bound_id: RecordId, grant: GrantId) -> Self {
        Self {
            issuer,
            bound_id,
            grant,
        }
    }

    pub fn issuer(&self) -> IssuerId {
        self.issuer
    }

    /// Record this capability may amend.
    pub fn bound_id(&self) -> &RecordId {
        &self.bound_id
    }

    pub fn grant(&self) -> GrantId {
        self.grant
    }
}
