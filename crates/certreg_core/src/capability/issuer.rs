//! Capability issuer: the registration and amendment state machine.
//!
//! # Responsibility
//! - Mint the reusable create capability and per-record continuing ones.
//! - Run validator, tracker and store adapter in a fixed order per exercise.
//! - Close the presented session exactly once on every exit path.
//!
//! # Invariants
//! - Quota/uniqueness reservation happens before the first store await, so
//!   every exercise scheduled during that await already observes it.
//! - A failed create releases its reservation; count never drifts.
//! - Create never overwrites a stored snapshot, even one the tracker has not
//!   admitted.
//! - Amendment only writes the node of the capability's bound ID and never
//!   touches the tracker.
//! - Amendment grants rotate synchronously before the store await and are
//!   restored when the write fails.
//!
//! # Policies
//! - Re-registering an admitted ID is rejected with `DuplicateId`.
//! - Continuing capabilities are consumed by each exercise; success returns
//!   a re-minted capability, rejection returns the original unchanged.

use crate::capability::error::{AmendRejected, RegistryError, RegistryResult, RestoreError};
use crate::capability::session::{Session, SessionOutcome};
use crate::capability::token::{ContinuingCapability, CreateCapability, GrantId, IssuerId};
use crate::config::{RegistryTerms, TermsError};
use crate::model::record::{Record, RecordId, RecordKind};
use crate::quota::tracker::{QuotaTracker, TrackerSnapshot};
use crate::store::record_store::RecordStore;
use crate::store::{NodeStore, StoreResult};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Successful exercise result handed back to the host.
#[derive(Debug)]
pub struct Published {
    /// Human-readable confirmation, also stored on the session.
    pub confirmation: String,
    /// Capability for further amendments of the same record.
    pub capability: ContinuingCapability,
}

/// Persistent issuer state carried by the host across restarts.
///
/// Take snapshots between exercises; in-flight reservations are included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerSnapshot {
    pub issuer: IssuerId,
    pub tracker: TrackerSnapshot,
    pub grants: BTreeMap<RecordId, GrantId>,
}

type GrantTable = Mutex<BTreeMap<RecordId, GrantId>>;

/// Registry instance for one namespace and record kind.
pub struct RecordIssuer<S: NodeStore> {
    id: IssuerId,
    terms: RegistryTerms,
    tracker: QuotaTracker,
    records: RecordStore<S>,
    grants: GrantTable,
}

impl<S: NodeStore> RecordIssuer<S> {
    /// Starts a fresh registry over `store`.
    ///
    /// The namespace is expected to be empty. Use [`RecordIssuer::adopt`] or
    /// [`RecordIssuer::restore`] over a populated store; creates for IDs that
    /// are already stored are rejected as duplicates either way.
    pub fn new(terms: RegistryTerms, store: S) -> Result<Self, TermsError> {
        let namespace = terms.namespace_path()?;
        info!(
            "event=issuer_start module=issuer status=ok kind={} namespace={} max_records={}",
            terms.kind, namespace, terms.max_records
        );
        Ok(Self {
            id: IssuerId::generate(),
            tracker: QuotaTracker::new(terms.max_records),
            records: RecordStore::new(store, namespace, terms.kind),
            grants: Mutex::new(BTreeMap::new()),
            terms,
        })
    }

    /// Rebuilds a registry from a snapshot. `terms.max_records` wins over the
    /// ceiling recorded in the snapshot.
    pub fn restore(
        terms: RegistryTerms,
        store: S,
        snapshot: &IssuerSnapshot,
    ) -> Result<Self, RestoreError> {
        let namespace = terms.namespace_path()?;
        let tracker = QuotaTracker::restore(&TrackerSnapshot {
            max_records: terms.max_records,
            ids: snapshot.tracker.ids.clone(),
        })?;
        if let Some(orphan) = snapshot.grants.keys().find(|id| !tracker.contains(id)) {
            return Err(RestoreError::OrphanGrant(orphan.clone()));
        }

        info!(
            "event=issuer_restore module=issuer status=ok kind={} namespace={} count={} max_records={}",
            terms.kind,
            namespace,
            tracker.count(),
            terms.max_records
        );
        Ok(Self {
            id: snapshot.issuer,
            tracker,
            records: RecordStore::new(store, namespace, terms.kind),
            grants: Mutex::new(snapshot.grants.clone()),
            terms,
        })
    }

    /// Starts a registry over a store that may already hold records of this
    /// namespace. Every stored ID is admitted into the tracker.
    ///
    /// Continuing capabilities minted by an earlier issuer are not carried
    /// over; use [`RecordIssuer::restore`] to keep them.
    pub async fn adopt(terms: RegistryTerms, store: S) -> Result<Self, RestoreError> {
        let namespace = terms.namespace_path()?;
        let records = RecordStore::new(store, namespace, terms.kind);
        let ids = records.stored_ids().await?;
        let tracker = QuotaTracker::restore(&TrackerSnapshot {
            max_records: terms.max_records,
            ids,
        })?;

        info!(
            "event=issuer_adopt module=issuer status=ok kind={} namespace={} count={} max_records={}",
            terms.kind,
            records.namespace(),
            tracker.count(),
            terms.max_records
        );
        Ok(Self {
            id: IssuerId::generate(),
            tracker,
            records,
            grants: Mutex::new(BTreeMap::new()),
            terms,
        })
    }

    pub fn snapshot(&self) -> IssuerSnapshot {
        IssuerSnapshot {
            issuer: self.id,
            tracker: self.tracker.snapshot(),
            grants: self.grants.lock().clone(),
        }
    }

    pub fn issuer_id(&self) -> IssuerId {
        self.id
    }

    pub fn terms(&self) -> &RegistryTerms {
        &self.terms
    }

    pub fn kind(&self) -> RecordKind {
        self.terms.kind
    }

    pub fn count(&self) -> u64 {
        self.tracker.count()
    }

    pub fn max_records(&self) -> u64 {
        self.tracker.max_records()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.tracker.contains(id)
    }

    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    /// Reads the stored snapshot of `id`.
    pub async fn read_record(&self, id: &RecordId) -> StoreResult<Record> {
        let node = self.records.locate(id)?;
        self.records.read(&node).await
    }

    pub fn issue_create_capability(&self) -> CreateCapability {
        CreateCapability::new(self.id)
    }

    /// Registers a new record.
    ///
    /// # Errors
    /// - `SessionNotOpen` when `session` was already closed; nothing else
    ///   is touched in that case.
    /// - Any other error closes `session` as rejected with the same value.
    pub async fn exercise_create(
        &self,
        capability: &CreateCapability,
        session: &mut Session,
        raw: Value,
    ) -> RegistryResult<Published> {
        session.ensure_open()?;

        let outcome = self.create(capability, raw).await;
        match &outcome {
            Ok(published) => {
                session.close(SessionOutcome::Success(published.confirmation.clone()))?;
                info!(
                    "event=record_create module=issuer status=ok session={} id={} count={} max={}",
                    session.id(),
                    published.capability.bound_id(),
                    self.tracker.count(),
                    self.tracker.max_records()
                );
            }
            Err(err) => {
                session.close(SessionOutcome::Rejected(err.clone()))?;
                warn!(
                    "event=record_create module=issuer status=rejected session={} error_code={} error={}",
                    session.id(),
                    err.code(),
                    err
                );
            }
        }
        outcome
    }

    /// Amends the record bound to `capability`.
    ///
    /// # Errors
    /// - Returns the error together with the unchanged capability; the
    ///   session is closed as rejected unless it was already closed.
    pub async fn exercise_continuing(
        &self,
        capability: ContinuingCapability,
        session: &mut Session,
        raw: Value,
    ) -> Result<Published, AmendRejected> {
        if let Err(err) = session.ensure_open() {
            return Err(AmendRejected {
                error: err.into(),
                capability,
            });
        }

        let outcome = self.amend(&capability, raw).await;
        let closing = match &outcome {
            Ok(_) => SessionOutcome::Success(self.kind().confirmation().to_string()),
            Err(err) => SessionOutcome::Rejected(err.clone()),
        };
        if let Err(err) = session.close(closing) {
            return Err(AmendRejected {
                error: err.into(),
                capability,
            });
        }

        match outcome {
            Ok(grant) => {
                info!(
                    "event=record_amend module=issuer status=ok session={} id={}",
                    session.id(),
                    capability.bound_id()
                );
                Ok(Published {
                    confirmation: self.kind().confirmation().to_string(),
                    capability: ContinuingCapability::new(
                        self.id,
                        capability.bound_id().clone(),
                        grant,
                    ),
                })
            }
            Err(error) => {
                warn!(
                    "event=record_amend module=issuer status=rejected session={} id={} error_code={} error={}",
                    session.id(),
                    capability.bound_id(),
                    error.code(),
                    error
                );
                Err(AmendRejected { error, capability })
            }
        }
    }

    async fn create(&self, capability: &CreateCapability, raw: Value) -> RegistryResult<Published> {
        self.check_issuer(capability.issuer())?;
        let record = Record::from_raw(self.kind(), raw)?;

        let reservation = self.tracker.try_reserve(record.id())?;
        // Suspension points from here on: the reservation above is already visible.
        if let Err(err) = self.store_new(&record).await {
            drop(reservation);
            warn!(
                "event=record_create module=issuer status=compensated id={} count={} error_code={}",
                record.id(),
                self.tracker.count(),
                err.code()
            );
            return Err(err);
        }
        reservation.commit();

        Ok(Published {
            confirmation: self.kind().confirmation().to_string(),
            capability: self.mint_continuing(record.id().clone()),
        })
    }

    async fn amend(&self, capability: &ContinuingCapability, raw: Value) -> RegistryResult<GrantId> {
        self.check_issuer(capability.issuer())?;

        let presented = presented_id(&raw, self.kind());
        if presented.as_deref() != Some(capability.bound_id().as_str()) {
            return Err(RegistryError::IdMismatch {
                bound: capability.bound_id().clone(),
                presented,
            });
        }
        let record = Record::from_raw(self.kind(), raw)?;

        let claim = claim_grant(&self.grants, capability)?;
        // Suspension point: the grant is already rotated.
        self.store(capability.bound_id(), &record).await?;
        Ok(claim.commit())
    }

    async fn store_new(&self, record: &Record) -> RegistryResult<()> {
        let node = self.records.ensure_node(record.id()).await?;
        if self.records.is_occupied(&node).await? {
            return Err(RegistryError::DuplicateId(record.id().clone()));
        }
        self.records.write(&node, record).await?;
        Ok(())
    }

    async fn store(&self, id: &RecordId, record: &Record) -> StoreResult<()> {
        let node = self.records.ensure_node(id).await?;
        self.records.write(&node, record).await
    }

    fn mint_continuing(&self, id: RecordId) -> ContinuingCapability {
        let grant = GrantId::generate();
        self.grants.lock().insert(id.clone(), grant);
        ContinuingCapability::new(self.id, id, grant)
    }

    fn check_issuer(&self, issuer: IssuerId) -> RegistryResult<()> {
        if issuer == self.id {
            Ok(())
        } else {
            Err(RegistryError::ForeignCapability)
        }
    }
}

fn presented_id(raw: &Value, kind: RecordKind) -> Option<String> {
    match raw.get(kind.schema().id_field)? {
        Value::String(id) => Some(id.clone()),
        other => Some(other.to_string()),
    }
}

fn claim_grant<'t>(
    grants: &'t GrantTable,
    capability: &ContinuingCapability,
) -> RegistryResult<GrantClaim<'t>> {
    let mut table = grants.lock();
    let id = capability.bound_id();
    match table.get(id) {
        Some(current) if *current == capability.grant() => {
            let next = GrantId::generate();
            table.insert(id.clone(), next);
            Ok(GrantClaim {
                grants,
                id: id.clone(),
                previous: capability.grant(),
                next,
                committed: false,
            })
        }
        _ => Err(RegistryError::StaleCapability(id.clone())),
    }
}

/// Rotated grant awaiting a successful write. Restores the previous grant
/// when dropped uncommitted.
struct GrantClaim<'t> {
    grants: &'t GrantTable,
    id: RecordId,
    previous: GrantId,
    next: GrantId,
    committed: bool,
}

impl GrantClaim<'_> {
    fn commit(mut self) -> GrantId {
        self.committed = true;
        self.next
    }
}

impl Drop for GrantClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.grants.lock().insert(self.id.clone(), self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RecordIssuer;
    use crate::capability::error::RegistryError;
    use crate::capability::session::Session;
    use crate::config::RegistryTerms;
    use crate::model::record::RecordKind;
    use crate::store::memory::MemoryNodeStore;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn capability_from_another_issuer_is_foreign() {
        let terms = RegistryTerms::for_kind(RecordKind::MedicalRecord);
        let first = RecordIssuer::new(terms.clone(), MemoryNodeStore::new()).expect("issuer");
        let second = RecordIssuer::new(terms, MemoryNodeStore::new()).expect("issuer");

        let capability = first.issue_create_capability();
        let mut session = Session::open();
        let err = block_on(second.exercise_create(
            &capability,
            &mut session,
            json!({
                "patientId": "P1",
                "name": "John Doe",
                "age": 30,
                "gender": "M",
                "bloodType": "O+"
            }),
        ))
        .expect_err("foreign capability must be rejected");

        assert_eq!(err, RegistryError::ForeignCapability);
        assert_eq!(second.count(), 0);
        assert!(!session.is_open());
    }
}
