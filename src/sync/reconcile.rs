use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::task::Task;
use crate::remote::{RemoteError, RemoteStore, RemoteTask};
use crate::session::SessionGate;
use crate::store::{StoreError, TaskStore};

use super::{SyncEvent, SyncEvents};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    NoIdentity,
    Replaced { count: usize },
}

/// Full pull: the remote set for the current identity replaces the local
/// table wholesale. Local rows that never reached the remote, or whose
/// newer edits did not, are discarded.
pub struct Reconciler {
    store: TaskStore,
    remote: Arc<dyn RemoteStore>,
    gate: SessionGate,
    events: SyncEvents,
}

impl Reconciler {
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
        }
    }

    pub fn full_sync(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(identity) = self.gate.current_identity() else {
            log::info!("no signed-in user; skipping full sync");
            return Ok(ReconcileOutcome::NoIdentity);
        };

        let rows = self.remote.select_for_user(&identity.id)?;
        let records: Vec<Task> = rows
            .into_iter()
            .filter(|row| row.user_id == identity.id)
            .map(RemoteTask::into_synced_task)
            .collect();

        let count = self.store.replace_all(&records)?;
        log::info!("full sync replaced local tasks with {count} remote row(s)");
        self.events.emit(SyncEvent::Reconciled { count });
        Ok(ReconcileOutcome::Replaced { count })
    }
}

#[derive(Debug)]
pub enum ReconcileError {
    Remote(RemoteError),
    Store(StoreError),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Remote(err) => write!(f, "could not fetch remote tasks: {}", err),
            ReconcileError::Store(err) => write!(f, "could not replace local tasks: {}", err),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReconcileError::Remote(err) => Some(err),
            ReconcileError::Store(err) => Some(err),
        }
    }
}

impl From<RemoteError> for ReconcileError {
    fn from(value: RemoteError) -> Self {
        ReconcileError::Remote(value)
    }
}

impl From<StoreError> for ReconcileError {
    fn from(value: StoreError) -> Self {
        ReconcileError::Store(value)
    }
}
