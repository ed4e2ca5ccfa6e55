use std::sync::Arc;
use std::time::Duration;

use super::{
    execute_push, PushKind, PushOp, PushOutcome, ReconcileError, ReconcileOutcome, Reconciler,
    SyncEngine, SyncEvent, SyncEvents,
};
use crate::domain::task::TaskPatch;
use crate::session::SessionGate;
use crate::store::TaskStore;
use crate::testing::{remote_row, FakeRemote};

struct Harness {
    store: TaskStore,
    remote: Arc<FakeRemote>,
    gate: SessionGate,
    events: SyncEvents,
}

impl Harness {
    fn new(remote: FakeRemote) -> Self {
        let remote = Arc::new(remote);
        Self {
            store: TaskStore::open_in_memory().expect("store should open"),
            gate: SessionGate::new(remote.clone()),
            remote,
            events: SyncEvents::default(),
        }
    }

    fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.store.clone(),
            self.remote.clone(),
            self.gate.clone(),
            self.events.clone(),
        )
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.store.clone(),
            self.remote.clone(),
            self.gate.clone(),
            self.events.clone(),
        )
    }

    fn push(&self, op: &PushOp) -> PushOutcome {
        execute_push(&self.store, self.remote.as_ref(), &self.gate, op)
    }

    fn create_local(&self, title: &str) -> String {
        self.store.create(title, "").expect("create should succeed")
    }

    fn create_op(&self, id: &str) -> PushOp {
        PushOp::Create(
            self.store
                .get(id)
                .expect("get should succeed")
                .expect("task should exist"),
        )
    }

    fn synced(&self, id: &str) -> bool {
        self.store
            .get(id)
            .expect("get should succeed")
            .expect("task should exist")
            .synced
    }
}

#[test]
fn create_push_inserts_scoped_row_and_marks_synced() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let id = harness.create_local("Write tests");

    let outcome = harness.push(&harness.create_op(&id));
    assert_eq!(outcome, PushOutcome::Synced);
    assert!(harness.synced(&id));

    let rows = harness.remote.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].user_id, "u-1");
    assert_eq!(rows[0].description.as_deref(), Some(""));
}

#[test]
fn failed_push_leaves_record_dirty_without_retry() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    harness.remote.fail_writes(true);
    let id = harness.create_local("Offline");

    let outcome = harness.push(&harness.create_op(&id));
    assert!(matches!(outcome, PushOutcome::Failed(_)));
    assert!(!harness.synced(&id));
    assert_eq!(harness.remote.calls().len(), 1);
}

#[test]
fn missing_identity_skips_every_remote_call() {
    let harness = Harness::new(FakeRemote::signed_out());
    let id = harness.create_local("Local only");

    for op in [
        harness.create_op(&id),
        PushOp::update(&id, &TaskPatch::completed()),
        PushOp::Complete { id: id.clone() },
        PushOp::Delete { id: id.clone() },
    ] {
        assert_eq!(harness.push(&op), PushOutcome::SkippedNoIdentity);
    }

    assert!(harness.remote.calls().is_empty());
    let task = harness
        .store
        .get(&id)
        .expect("get should succeed")
        .expect("task should still exist");
    assert!(!task.synced);
    assert!(!task.completed);
}

#[test]
fn point_pushes_filter_by_id_and_user() {
    let harness = Harness::new(FakeRemote::signed_in("u-7"));
    let id = harness.create_local("Scoped");
    harness.push(&harness.create_op(&id));

    let patch = TaskPatch {
        title: Some("Renamed".to_string()),
        description: Some("details".to_string()),
        completed: None,
    };
    harness.store.update(&id, &patch).expect("update should succeed");
    assert_eq!(
        harness.push(&PushOp::update(&id, &patch)),
        PushOutcome::Synced
    );
    assert_eq!(
        harness.push(&PushOp::Complete { id: id.clone() }),
        PushOutcome::Synced
    );

    let row = harness.remote.rows().pop().expect("row should exist");
    assert_eq!(row.title, "Renamed");
    assert_eq!(row.description.as_deref(), Some("details"));
    assert!(row.completed);

    assert_eq!(
        harness.push(&PushOp::Delete { id: id.clone() }),
        PushOutcome::Deleted
    );
    assert!(harness.remote.rows().is_empty());
    assert_eq!(
        harness.remote.calls(),
        vec![
            format!("insert {id} user=u-7"),
            format!("update {id} user=u-7"),
            format!("update {id} user=u-7"),
            format!("delete {id} user=u-7"),
        ]
    );
}

#[test]
fn pushes_cannot_touch_rows_of_another_user() {
    let harness = Harness::new(FakeRemote::signed_in("intruder"));
    harness.remote.seed(remote_row("victim-task", "owner", "Private"));

    harness.push(&PushOp::Complete {
        id: "victim-task".to_string(),
    });
    harness.push(&PushOp::Delete {
        id: "victim-task".to_string(),
    });

    let rows = harness.remote.rows();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].completed);
}

#[test]
fn stale_push_can_mark_newer_local_edit_synced() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let id = harness.create_local("First");
    let first_push = harness.create_op(&id);

    let newer = TaskPatch {
        title: Some("Second".to_string()),
        ..TaskPatch::default()
    };
    harness.store.update(&id, &newer).expect("update should succeed");
    assert!(!harness.synced(&id));

    assert_eq!(harness.push(&first_push), PushOutcome::Synced);
    assert!(harness.synced(&id));
    assert_eq!(harness.remote.rows()[0].title, "First");
}

#[test]
fn engine_dispatches_on_background_threads_and_reports_events() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let engine = harness.engine();
    let events = harness.events.subscribe();

    let first = harness.create_local("One");
    let second = harness.create_local("Two");
    engine.dispatch(harness.create_op(&first));
    engine.dispatch(harness.create_op(&second));

    let outcomes = engine.wait_idle();
    assert_eq!(outcomes, vec![PushOutcome::Synced, PushOutcome::Synced]);
    assert!(harness.synced(&first));
    assert!(harness.synced(&second));

    let mut seen = Vec::new();
    for _ in 0..2 {
        match events
            .recv_timeout(Duration::from_secs(5))
            .expect("push event should arrive")
        {
            SyncEvent::Pushed {
                task_id,
                kind,
                outcome,
            } => {
                assert_eq!(kind, PushKind::Create);
                assert_eq!(outcome, PushOutcome::Synced);
                seen.push(task_id);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    seen.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn wait_idle_keeps_outcomes_of_pushes_that_finished_earlier() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let engine = harness.engine();
    let events = harness.events.subscribe();

    let first = harness.create_local("Early");
    harness.remote.fail_writes(true);
    engine.dispatch(harness.create_op(&first));
    events
        .recv_timeout(Duration::from_secs(5))
        .expect("first push event should arrive");
    std::thread::sleep(Duration::from_millis(100));

    harness.remote.fail_writes(false);
    let second = harness.create_local("Late");
    engine.dispatch(harness.create_op(&second));

    let outcomes = engine.wait_idle();
    assert_eq!(outcomes.len(), 2, "outcomes: {outcomes:?}");
    assert!(matches!(outcomes[0], PushOutcome::Failed(_)));
    assert_eq!(outcomes[1], PushOutcome::Synced);
    assert!(!harness.synced(&first));
    assert!(harness.synced(&second));
    assert!(engine.wait_idle().is_empty());
}

#[test]
fn wait_idle_with_nothing_in_flight_is_empty() {
    let harness = Harness::new(FakeRemote::signed_out());
    assert!(harness.engine().wait_idle().is_empty());
}

#[test]
fn dropped_subscribers_are_pruned() {
    let events = SyncEvents::default();
    let kept = events.subscribe();
    drop(events.subscribe());

    events.emit(SyncEvent::Reconciled { count: 3 });
    assert_eq!(
        kept.try_recv().expect("kept subscriber should receive"),
        SyncEvent::Reconciled { count: 3 }
    );
}

#[test]
fn reconcile_without_identity_changes_nothing() {
    let harness = Harness::new(FakeRemote::signed_out());
    let id = harness.create_local("Keep me");

    let outcome = harness.reconciler().full_sync().expect("skip is not an error");
    assert_eq!(outcome, ReconcileOutcome::NoIdentity);
    assert!(harness.store.get(&id).expect("get").is_some());
    assert!(harness.remote.calls().is_empty());
}

#[test]
fn reconcile_replaces_local_state_and_drops_unsynced_records() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let local_only = harness.create_local("Never pushed");
    harness.remote.seed(remote_row("r-1", "u-1", "Remote one"));
    harness.remote.seed(remote_row("r-2", "u-1", "Remote two"));
    harness.remote.seed(remote_row("r-3", "someone-else", "Not mine"));
    let events = harness.events.subscribe();

    let outcome = harness.reconciler().full_sync().expect("sync should succeed");
    assert_eq!(outcome, ReconcileOutcome::Replaced { count: 2 });

    let tasks = harness.store.list().expect("list should succeed");
    let ids: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(ids, vec!["r-2", "r-1"]);
    assert!(tasks.iter().all(|task| task.synced));
    assert!(tasks.iter().all(|task| task.description.is_empty()));
    assert!(harness.store.get(&local_only).expect("get").is_none());

    assert_eq!(
        events.try_recv().expect("reconcile event should be emitted"),
        SyncEvent::Reconciled { count: 2 }
    );
}

#[test]
fn reconcile_fetch_failure_leaves_local_rows() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let id = harness.create_local("Survivor");
    harness.remote.fail_reads(true);

    let result = harness.reconciler().full_sync();
    assert!(matches!(result, Err(ReconcileError::Remote(_))));
    assert!(harness.store.get(&id).expect("get").is_some());
}

#[test]
fn reconcile_store_failure_is_all_or_nothing() {
    let harness = Harness::new(FakeRemote::signed_in("u-1"));
    let id = harness.create_local("Old state");
    harness.remote.seed(remote_row("dup", "u-1", "One"));
    harness.remote.seed(remote_row("dup", "u-1", "Two"));

    let result = harness.reconciler().full_sync();
    assert!(matches!(result, Err(ReconcileError::Store(_))));

    let tasks = harness.store.list().expect("list should succeed");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
}
