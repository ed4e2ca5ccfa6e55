use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::domain::task::{Task, TaskPatch};
use crate::remote::{RemoteChanges, RemoteStore, RemoteTask};
use crate::session::SessionGate;
use crate::store::TaskStore;

mod reconcile;

pub use reconcile::{ReconcileError, ReconcileOutcome, Reconciler};

/// Remote call matching one local mutation, captured at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOp {
    Create(Task),
    Update { id: String, changes: RemoteChanges },
    Complete { id: String },
    Delete { id: String },
}

impl PushOp {
    pub fn update(id: &str, patch: &TaskPatch) -> Self {
        PushOp::Update {
            id: id.to_string(),
            changes: RemoteChanges::from(patch),
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            PushOp::Create(task) => &task.id,
            PushOp::Update { id, .. } | PushOp::Complete { id } | PushOp::Delete { id } => id,
        }
    }

    pub fn kind(&self) -> PushKind {
        match self {
            PushOp::Create(_) => PushKind::Create,
            PushOp::Update { .. } => PushKind::Update,
            PushOp::Complete { .. } => PushKind::Complete,
            PushOp::Delete { .. } => PushKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    Create,
    Update,
    Complete,
    Delete,
}

impl PushKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PushKind::Create => "create",
            PushKind::Update => "update",
            PushKind::Complete => "complete",
            PushKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum PushOutcome {
    Synced,
    Deleted,
    SkippedNoIdentity,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Pushed {
        task_id: String,
        kind: PushKind,
        outcome: PushOutcome,
    },
    Reconciled {
        count: usize,
    },
}

/// Fan-out of sync events to any number of subscribers. Subscribers that
/// dropped their receiver are pruned on the next emit.
#[derive(Clone, Default)]
pub struct SyncEvents {
    subscribers: Arc<Mutex<Vec<Sender<SyncEvent>>>>,
}

impl SyncEvents {
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

/// Pushes local mutations to the remote store on detached threads.
///
/// Pushes are never queued, retried, or cancelled, and two pushes for the
/// same task may be in flight at once; whichever remote call lands last
/// wins. Handles are kept only so shutdown can wait for them.
pub struct SyncEngine {
    store: TaskStore,
    remote: Arc<dyn RemoteStore>,
    gate: SessionGate,
    events: SyncEvents,
    pushes: Mutex<Vec<PushSlot>>,
}

/// One dispatched push, in dispatch order. Finished threads are joined and
/// their outcome kept until `wait_idle` hands it out.
enum PushSlot {
    Running(JoinHandle<PushOutcome>),
    Done(PushOutcome),
}

impl PushSlot {
    fn settle(self) -> Option<PushSlot> {
        match self {
            PushSlot::Running(handle) if handle.is_finished() => {
                join_push(handle).map(PushSlot::Done)
            }
            other => Some(other),
        }
    }

    fn into_outcome(self) -> Option<PushOutcome> {
        match self {
            PushSlot::Running(handle) => join_push(handle),
            PushSlot::Done(outcome) => Some(outcome),
        }
    }
}

fn join_push(handle: JoinHandle<PushOutcome>) -> Option<PushOutcome> {
    match handle.join() {
        Ok(outcome) => Some(outcome),
        Err(_) => {
            log::error!("push thread panicked");
            None
        }
    }
}

impl SyncEngine {
    pub fn new(
        store: TaskStore,
        remote: Arc<dyn RemoteStore>,
        gate: SessionGate,
        events: SyncEvents,
    ) -> Self {
        Self {
            store,
            remote,
            gate,
            events,
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch(&self, op: PushOp) {
        let store = self.store.clone();
        let remote = Arc::clone(&self.remote);
        let gate = self.gate.clone();
        let events = self.events.clone();

        let spawned = thread::Builder::new()
            .name(format!("push-{}", op.kind().as_str()))
            .spawn(move || {
                let outcome = execute_push(&store, remote.as_ref(), &gate, &op);
                events.emit(SyncEvent::Pushed {
                    task_id: op.task_id().to_string(),
                    kind: op.kind(),
                    outcome: outcome.clone(),
                });
                outcome
            });

        match spawned {
            Ok(handle) => match self.pushes.lock() {
                Ok(mut pushes) => {
                    let slots = std::mem::take(&mut *pushes);
                    *pushes = slots.into_iter().filter_map(PushSlot::settle).collect();
                    pushes.push(PushSlot::Running(handle));
                }
                Err(_) => log::warn!("push tracker lock poisoned; push runs untracked"),
            },
            Err(err) => log::error!("could not spawn push thread: {err}"),
        }
    }

    /// Blocks until every push dispatched so far has finished and returns
    /// their outcomes in dispatch order, including pushes that finished
    /// before this call.
    pub fn wait_idle(&self) -> Vec<PushOutcome> {
        let slots = match self.pushes.lock() {
            Ok(mut pushes) => std::mem::take(&mut *pushes),
            Err(_) => return Vec::new(),
        };
        slots.into_iter().filter_map(PushSlot::into_outcome).collect()
    }
}

/// One push attempt: resolve identity, issue the remote call, promote the
/// local row to synced on success.
pub fn execute_push(
    store: &TaskStore,
    remote: &dyn RemoteStore,
    gate: &SessionGate,
    op: &PushOp,
) -> PushOutcome {
    let task_id = op.task_id();
    let kind = op.kind().as_str();
    let Some(identity) = gate.current_identity() else {
        log::info!("no signed-in user; skipping {kind} push for task {task_id}");
        return PushOutcome::SkippedNoIdentity;
    };

    let result = match op {
        PushOp::Create(task) => remote.insert(&RemoteTask::from_task(task, &identity.id)),
        PushOp::Update { id, changes } => remote.update(id, &identity.id, changes),
        PushOp::Complete { id } => {
            let changes = RemoteChanges {
                completed: Some(true),
                ..RemoteChanges::default()
            };
            remote.update(id, &identity.id, &changes)
        }
        PushOp::Delete { id } => remote.delete(id, &identity.id),
    };

    if let Err(err) = result {
        log::warn!("{kind} push for task {task_id} failed: {err}");
        return PushOutcome::Failed(err.to_string());
    }

    if let PushOp::Delete { .. } = op {
        log::debug!("remote delete for task {task_id} acknowledged");
        return PushOutcome::Deleted;
    }

    match store.mark_synced(task_id) {
        Ok(true) => {
            log::debug!("{kind} push for task {task_id} acknowledged");
            PushOutcome::Synced
        }
        Ok(false) => {
            log::debug!("task {task_id} removed locally before its {kind} push landed");
            PushOutcome::Synced
        }
        Err(err) => {
            log::error!("could not mark task {task_id} synced: {err}");
            PushOutcome::Failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests;
