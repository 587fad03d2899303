//! Per-exercise session state.
//!
//! # Invariants
//! - A session moves `Open -> Closed` exactly once.
//! - A closed session is immutable and cannot be presented again.
//! - Dropping a session that is still open is logged as a defect.

use crate::capability::error::RegistryError;
use log::error;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable session identifier used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Terminal result of one exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Carries the human-readable confirmation.
    Success(String),
    Rejected(RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed(SessionOutcome),
}

/// Execution context for one exercise of a capability.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    pub fn open() -> Self {
        Self {
            id: SessionId(Uuid::new_v4()),
            state: SessionState::Open,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Returns the outcome once closed.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        match &self.state {
            SessionState::Open => None,
            SessionState::Closed(outcome) => Some(outcome),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::AlreadyClosed(self.id))
        }
    }

    pub(crate) fn close(&mut self, outcome: SessionOutcome) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.state = SessionState::Closed(outcome);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_open() {
            error!(
                "event=session_dropped module=session status=error session={} state=open",
                self.id
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    AlreadyClosed(SessionId),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyClosed(id) => write!(f, "session already closed: {id}"),
        }
    }
}

impl Error for SessionError {}
