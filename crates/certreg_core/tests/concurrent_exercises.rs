//! Interleaves exercises around the store write, the point where an
//! exercise yields to others.

use async_trait::async_trait;
use certreg_core::{
    ContinuingCapability, MemoryNodeStore, NodePath, NodeStore, RecordId, RecordIssuer, RecordKind, RegistryError,
    RegistryTerms, Session, StoreResult,
};
use futures::channel::{mpsc, oneshot};
use futures::executor::block_on;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Store whose writes to gated paths park until released.
struct GatedStore {
    inner: MemoryNodeStore,
    entered: mpsc::UnboundedSender<NodePath>,
    gates: Mutex<HashMap<NodePath, oneshot::Receiver<()>>>,
}

impl GatedStore {
    fn new() -> (Self, mpsc::UnboundedReceiver<NodePath>) {
        let (entered, parked) = mpsc::unbounded();
        let store = Self {
            inner: MemoryNodeStore::new(),
            entered,
            gates: Mutex::new(HashMap::new()),
        };
        (store, parked)
    }

    fn gate(&self, path: &str) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates
            .lock()
            .insert(NodePath::parse(path).unwrap(), gate);
        release
    }
}

#[async_trait]
impl NodeStore for GatedStore {
    async fn make_child_node(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath> {
        self.inner.make_child_node(parent, name).await
    }

    async fn set_value(&self, node: &NodePath, value: String) -> StoreResult<()> {
        let gate = self.gates.lock().remove(node);
        if let Some(gate) = gate {
            self.entered.unbounded_send(node.clone()).unwrap();
            gate.await.unwrap();
        }
        self.inner.set_value(node, value).await
    }

    async fn get_value(&self, node: &NodePath) -> StoreResult<Option<String>> {
        self.inner.get_value(node).await
    }

    async fn child_names(&self, parent: &NodePath) -> StoreResult<Vec<String>> {
        self.inner.child_names(parent).await
    }
}

fn certificate(id: &str) -> Value {
    json!({
        "certificateId": id,
        "studentName": "John Doe",
        "courseName": "Distributed Systems",
        "certificateType": "degree"
    })
}

fn issuer(max_records: u64) -> (RecordIssuer<GatedStore>, mpsc::UnboundedReceiver<NodePath>) {
    let (store, parked) = GatedStore::new();
    let terms = RegistryTerms::for_kind(RecordKind::Certificate).with_max_records(max_records);
    (RecordIssuer::new(terms, store).unwrap(), parked)
}

#[test]
fn suspended_creates_both_succeed_and_reservations_stay_visible() {
    let (issuer, mut parked) = issuer(2);
    let release_a = issuer.records().node_store().gate("certificates/A");
    let release_b = issuer.records().node_store().gate("certificates/B");
    let capability = issuer.issue_create_capability();
    let (mut session_a, mut session_b, mut session_c) =
        (Session::open(), Session::open(), Session::open());

    let (a, b, late) = block_on(async {
        futures::join!(
            issuer.exercise_create(&capability, &mut session_a, certificate("A")),
            issuer.exercise_create(&capability, &mut session_b, certificate("B")),
            async {
                parked.next().await.unwrap();
                parked.next().await.unwrap();
                assert_eq!(issuer.count(), 2);

                let late = issuer
                    .exercise_create(&capability, &mut session_c, certificate("C"))
                    .await;

                release_a.send(()).unwrap();
                release_b.send(()).unwrap();
                late
            }
        )
    });

    assert_eq!(a.unwrap().capability.bound_id(), &RecordId::from("A"));
    assert_eq!(b.unwrap().capability.bound_id(), &RecordId::from("B"));
    assert_eq!(
        late.unwrap_err(),
        RegistryError::QuotaExceeded { max_records: 2 }
    );
    assert_eq!(issuer.count(), 2);
}

#[test]
fn quota_race_admits_only_one_of_two_suspended_creates() {
    let (issuer, mut parked) = issuer(1);
    let release_a = issuer.records().node_store().gate("certificates/A");
    let capability = issuer.issue_create_capability();
    let (mut session_a, mut session_b) = (Session::open(), Session::open());

    let (a, b) = block_on(async {
        futures::join!(
            issuer.exercise_create(&capability, &mut session_a, certificate("A")),
            async {
                parked.next().await.unwrap();
                // A is parked at its write with the only slot reserved.
                let b = issuer
                    .exercise_create(&capability, &mut session_b, certificate("B"))
                    .await;
                release_a.send(()).unwrap();
                b
            }
        )
    });

    assert!(a.is_ok());
    assert_eq!(b.unwrap_err(), RegistryError::QuotaExceeded { max_records: 1 });
    assert_eq!(issuer.count(), 1);
}

#[test]
fn duplicate_id_is_caught_while_first_write_is_suspended() {
    let (issuer, mut parked) = issuer(10);
    let release = issuer.records().node_store().gate("certificates/A");
    let capability = issuer.issue_create_capability();
    let (mut first, mut second) = (Session::open(), Session::open());

    let (a, again) = block_on(async {
        futures::join!(
            issuer.exercise_create(&capability, &mut first, certificate("A")),
            async {
                parked.next().await.unwrap();
                let again = issuer
                    .exercise_create(&capability, &mut second, certificate("A"))
                    .await;
                release.send(()).unwrap();
                again
            }
        )
    });

    assert!(a.is_ok());
    assert_eq!(
        again.unwrap_err(),
        RegistryError::DuplicateId(RecordId::from("A"))
    );
    assert_eq!(issuer.count(), 1);
}

#[test]
fn failed_write_releases_quota_while_another_create_is_suspended() {
    let (issuer, mut parked) = issuer(2);
    let release_a = issuer.records().node_store().gate("certificates/A");
    issuer
        .records()
        .node_store()
        .inner
        .fail_writes_to(NodePath::parse("certificates/B").unwrap());
    let capability = issuer.issue_create_capability();
    let (mut session_a, mut session_b) = (Session::open(), Session::open());

    let (a, b) = block_on(async {
        futures::join!(
            issuer.exercise_create(&capability, &mut session_a, certificate("A")),
            async {
                parked.next().await.unwrap();
                let b = issuer
                    .exercise_create(&capability, &mut session_b, certificate("B"))
                    .await;
                assert_eq!(issuer.count(), 1);
                release_a.send(()).unwrap();
                b
            }
        )
    });

    assert!(a.is_ok());
    assert!(matches!(b, Err(RegistryError::Storage(_))));
    assert_eq!(issuer.count(), 1);
    assert!(!issuer.contains(&RecordId::from("B")));
}

#[test]
fn amendments_of_different_records_interleave_independently() {
    let (issuer, mut parked) = issuer(2);
    let capability = issuer.issue_create_capability();
    let mut created = Vec::new();
    for id in ["A", "B"] {
        let mut session = Session::open();
        created.push(
            block_on(issuer.exercise_create(&capability, &mut session, certificate(id)))
                .unwrap()
                .capability,
        );
    }
    let capability_b = created.pop().unwrap();
    let capability_a = created.pop().unwrap();

    let release_a = issuer.records().node_store().gate("certificates/A");
    let release_b = issuer.records().node_store().gate("certificates/B");
    let mut amended_a = certificate("A");
    amended_a["grade"] = json!("A+");
    let mut amended_b = certificate("B");
    amended_b["grade"] = json!("B-");
    let (mut session_a, mut session_b) = (Session::open(), Session::open());

    let (a, b, ()) = block_on(async {
        futures::join!(
            issuer.exercise_continuing(capability_a, &mut session_a, amended_a),
            issuer.exercise_continuing(capability_b, &mut session_b, amended_b),
            async {
                parked.next().await.unwrap();
                parked.next().await.unwrap();
                release_b.send(()).unwrap();
                release_a.send(()).unwrap();
            }
        )
    });

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(issuer.count(), 2);
    let record_a = block_on(issuer.read_record(&RecordId::from("A"))).unwrap();
    let record_b = block_on(issuer.read_record(&RecordId::from("B"))).unwrap();
    assert_eq!(record_a.field("grade"), Some(&json!("A+")));
    assert_eq!(record_b.field("grade"), Some(&json!("B-")));
}

#[test]
fn parked_amendment_holds_the_grant_until_its_write_settles() {
    let (issuer, mut parked) = issuer(2);
    let mut created = Session::open();
    let capability = block_on(issuer.exercise_create(
        &issuer.issue_create_capability(),
        &mut created,
        certificate("A"),
    ))
    .unwrap()
    .capability;
    let original_grant = capability.grant();
    let copy: ContinuingCapability =
        serde_json::from_value(serde_json::to_value(&capability).unwrap()).unwrap();

    let store = issuer.records().node_store();
    let release = store.gate("certificates/A");
    store
        .inner
        .fail_writes_to(NodePath::parse("certificates/A").unwrap());
    let mut amended = certificate("A");
    amended["grade"] = json!("A+");
    let (mut first, mut replay) = (Session::open(), Session::open());

    let (parked_amend, replayed) = block_on(async {
        futures::join!(
            issuer.exercise_continuing(capability, &mut first, amended.clone()),
            async {
                parked.next().await.unwrap();
                // The first amendment is parked with the grant already rotated.
                let replayed = issuer
                    .exercise_continuing(copy, &mut replay, certificate("A"))
                    .await;
                release.send(()).unwrap();
                replayed
            }
        )
    });

    let replayed = replayed.unwrap_err();
    assert_eq!(
        replayed.error,
        RegistryError::StaleCapability(RecordId::from("A"))
    );
    let rejected = parked_amend.unwrap_err();
    assert!(matches!(rejected.error, RegistryError::Storage(_)));
    assert_eq!(rejected.capability.grant(), original_grant);

    store.inner.clear_write_failures();
    let mut retry = Session::open();
    let published =
        block_on(issuer.exercise_continuing(rejected.capability, &mut retry, amended)).unwrap();
    assert_ne!(published.capability.grant(), original_grant);
    let record = block_on(issuer.read_record(&RecordId::from("A"))).unwrap();
    assert_eq!(record.field("grade"), Some(&json!("A+")));
    assert_eq!(issuer.count(), 1);
}
