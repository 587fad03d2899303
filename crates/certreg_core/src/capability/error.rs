//! Typed failures returned by capability exercises.

use crate::capability::session::{SessionError, SessionId};
use crate::capability::token::ContinuingCapability;
use crate::config::TermsError;
use crate::model::record::RecordId;
use crate::model::validation::ValidationError;
use crate::quota::tracker::ReserveError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Terminal failure of one exercise. Never retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Validation(ValidationError),
    DuplicateId(RecordId),
    QuotaExceeded {
        max_records: u64,
    },
    /// Continuing capability presented with another record's input.
    IdMismatch {
        bound: RecordId,
        presented: Option<String>,
    },
    Storage(StoreError),
    /// Capability was minted by a different issuer instance.
    ForeignCapability,
    /// Continuing capability was superseded by a later amendment.
    StaleCapability(RecordId),
    SessionNotOpen(SessionId),
}

impl RegistryError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::DuplicateId(_) => "duplicate_id",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::IdMismatch { .. } => "id_mismatch",
            Self::Storage(_) => "storage",
            Self::ForeignCapability => "foreign_capability",
            Self::StaleCapability(_) => "stale_capability",
            Self::SessionNotOpen(_) => "session_not_open",
        }
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid record data: {err}"),
            Self::DuplicateId(id) => write!(f, "record id already registered: {id}"),
            Self::QuotaExceeded { max_records } => {
                write!(f, "maximum number of records reached ({max_records})")
            }
            Self::IdMismatch { bound, presented } => write!(
                f,
                "capability is bound to `{bound}` but input names `{}`",
                presented.as_deref().unwrap_or("<none>")
            ),
            Self::Storage(err) => write!(f, "failed to publish record data: {err}"),
            Self::ForeignCapability => write!(f, "capability was not issued by this registry"),
            Self::StaleCapability(id) => {
                write!(f, "capability for `{id}` was superseded by a later amendment")
            }
            Self::SessionNotOpen(id) => write!(f, "session is not open: {id}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RegistryError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

impl From<ReserveError> for RegistryError {
    fn from(value: ReserveError) -> Self {
        match value {
            ReserveError::DuplicateId(id) => Self::DuplicateId(id),
            ReserveError::QuotaExceeded { max_records } => Self::QuotaExceeded { max_records },
        }
    }
}

impl From<SessionError> for RegistryError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::AlreadyClosed(id) => Self::SessionNotOpen(id),
        }
    }
}

/// Rejected amendment. Hands the unchanged capability back to the caller.
#[derive(Debug)]
pub struct AmendRejected {
    pub error: RegistryError,
    pub capability: ContinuingCapability,
}

impl Display for AmendRejected {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AmendRejected {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Errors rebuilding an issuer from a snapshot or from stored records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    Terms(TermsError),
    Tracker(ReserveError),
    /// Grant recorded for an ID the tracker never admitted.
    OrphanGrant(RecordId),
    /// Stored records could not be listed.
    Store(StoreError),
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terms(err) => write!(f, "{err}"),
            Self::Tracker(err) => write!(f, "invalid tracker snapshot: {err}"),
            Self::OrphanGrant(id) => write!(f, "grant recorded for unknown record: {id}"),
            Self::Store(err) => write!(f, "failed to list stored records: {err}"),
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Terms(err) => Some(err),
            Self::Tracker(err) => Some(err),
            Self::OrphanGrant(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<TermsError> for RestoreError {
    fn from(value: TermsError) -> Self {
        Self::Terms(value)
    }
}

impl From<StoreError> for RestoreError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ReserveError> for RestoreError {
    fn from(value: ReserveError) -> Self {
        Self::Tracker(value)
    }
}
