//! Quota and uniqueness tracking for one record collection.
//!
//! # Responsibility
//! - Own the set of admitted record IDs and compare its size to the ceiling.
//! - Hand out reservations that are effective the moment they are granted.
//!
//! # Invariants
//! - `count() <= max_records()` at all times.
//! - `try_reserve` checks and inserts under one lock, with no await in between.
//! - A reservation that is dropped without `commit` is released.

use crate::model::record::RecordId;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reservation rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveError {
    DuplicateId(RecordId),
    QuotaExceeded { max_records: u64 },
}

impl Display for ReserveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "record id already registered: {id}"),
            Self::QuotaExceeded { max_records } => {
                write!(f, "maximum number of records reached ({max_records})")
            }
        }
    }
}

impl Error for ReserveError {}

/// Serializable tracker state, carried by the host between restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub max_records: u64,
    pub ids: Vec<RecordId>,
}

/// Admitted-ID set with a fixed ceiling.
#[derive(Debug)]
pub struct QuotaTracker {
    max_records: u64,
    ids: Mutex<BTreeSet<RecordId>>,
}

impl QuotaTracker {
    pub fn new(max_records: u64) -> Self {
        Self {
            max_records,
            ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Rebuilds a tracker from a snapshot.
    ///
    /// # Errors
    /// - Returns `DuplicateId` or `QuotaExceeded` when the snapshot itself
    ///   violates the tracker invariants.
    pub fn restore(snapshot: &TrackerSnapshot) -> Result<Self, ReserveError> {
        let tracker = Self::new(snapshot.max_records);
        for id in &snapshot.ids {
            tracker.try_reserve(id)?.commit();
        }
        Ok(tracker)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            max_records: self.max_records,
            ids: self.ids.lock().iter().cloned().collect(),
        }
    }

    pub fn max_records(&self) -> u64 {
        self.max_records
    }

    pub fn count(&self) -> u64 {
        self.ids.lock().len() as u64
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.lock().contains(id)
    }

    /// Claims quota and uniqueness for `id`.
    ///
    /// The ID is visible to every other caller as soon as this returns `Ok`.
    /// Commit the returned reservation once the record is durably written;
    /// dropping it instead undoes the claim.
    pub fn try_reserve(&self, id: &RecordId) -> Result<Reservation<'_>, ReserveError> {
        let mut ids = self.ids.lock();
        if ids.contains(id) {
            return Err(ReserveError::DuplicateId(id.clone()));
        }
        if ids.len() as u64 >= self.max_records {
            return Err(ReserveError::QuotaExceeded {
                max_records: self.max_records,
            });
        }
        ids.insert(id.clone());
        debug!(
            "event=quota_reserve module=quota status=ok id={} count={} max={}",
            id,
            ids.len(),
            self.max_records
        );

        Ok(Reservation {
            tracker: self,
            id: id.clone(),
            committed: false,
        })
    }

    /// Removes `id` from the admitted set.
    ///
    /// Returns whether the ID was present.
    pub fn release(&self, id: &RecordId) -> bool {
        let mut ids = self.ids.lock();
        let removed = ids.remove(id);
        if removed {
            debug!(
                "event=quota_release module=quota status=ok id={} count={}",
                id,
                ids.len()
            );
        } else {
            warn!("event=quota_release module=quota status=noop id={id}");
        }
        removed
    }
}

/// Pending claim on one ID.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it"]
pub struct Reservation<'t> {
    tracker: &'t QuotaTracker,
    id: RecordId,
    committed: bool,
}

impl Reservation<'_> {
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Keeps the claim permanently.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tracker.release(&self.id);
        }
    }
}
