use std::error::Error;
use std::fmt;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ConfigError, Settings};
use crate::domain::task::{Task, TaskPatch};
use crate::remote::{RemoteError, RemoteStore, SqliteRemote};
use crate::session::{AuthProvider, Identity, SessionGate};
use crate::store::{StoreError, TaskStore};
use crate::sync::{
    PushOp, PushOutcome, ReconcileError, ReconcileOutcome, Reconciler, SyncEngine, SyncEvent,
    SyncEvents,
};

/// User-facing operations. Local writes happen on the caller's thread and
/// return immediately; remote propagation is handed to the sync engine.
pub struct App {
    store: TaskStore,
    auth: Arc<dyn AuthProvider>,
    gate: SessionGate,
    engine: SyncEngine,
    reconciler: Reconciler,
    events: SyncEvents,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignInSummary {
    pub identity: Option<Identity>,
    pub pull: Option<ReconcileOutcome>,
}

impl App {
    pub fn open(settings: &Settings) -> Result<Self, AppError> {
        let store = TaskStore::open(&settings.db_path)?;
        let remote = Arc::new(SqliteRemote::open(
            &settings.remote_path,
            settings.session_path.clone(),
        )?);
        Ok(Self::with_collaborators(store, remote.clone(), remote))
    }

    pub fn with_collaborators(
        store: TaskStore,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let gate = SessionGate::new(Arc::clone(&auth));
        let events = SyncEvents::default();
        let engine = SyncEngine::new(
            store.clone(),
            Arc::clone(&remote),
            gate.clone(),
            events.clone(),
        );
        let reconciler = Reconciler::new(store.clone(), remote, gate.clone(), events.clone());
        Self {
            store,
            auth,
            gate,
            engine,
            reconciler,
            events,
        }
    }

    pub fn create_task(&self, title: &str, description: Option<&str>) -> Result<Task, AppError> {
        let title = required_title(title)?;
        let description = description.map(str::trim).unwrap_or_default();

        let id = self.store.create(&title, description)?;
        let task = self
            .store
            .get(&id)?
            .ok_or_else(|| AppError::NotFound(id.clone()))?;
        self.engine.dispatch(PushOp::Create(task.clone()));
        Ok(task)
    }

    pub fn edit_task(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Task, AppError> {
        let patch = TaskPatch {
            title: title.map(str::to_string),
            description: description.map(str::to_string),
            completed: None,
        };
        self.update_task(id, patch)
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Task, AppError> {
        if !patch.has_changes() {
            return Err(AppError::InvalidArgument(
                "update requires at least one field change".to_string(),
            ));
        }

        let patch = TaskPatch {
            title: patch.title.as_deref().map(required_title).transpose()?,
            description: patch.description.map(|raw| raw.trim().to_string()),
            completed: patch.completed,
        };
        if !self.store.update(id, &patch)? {
            return Err(AppError::NotFound(id.to_string()));
        }
        self.engine.dispatch(PushOp::update(id, &patch));
        self.show_task(id)?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    pub fn complete_task(&self, id: &str) -> Result<Task, AppError> {
        if !self.store.update(id, &TaskPatch::completed())? {
            return Err(AppError::NotFound(id.to_string()));
        }
        self.engine.dispatch(PushOp::Complete { id: id.to_string() });
        self.show_task(id)?
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    /// Local removal is unconditional; the remote delete is best-effort.
    pub fn delete_task(&self, id: &str) -> Result<(), AppError> {
        self.store.delete(id)?;
        self.engine.dispatch(PushOp::Delete { id: id.to_string() });
        Ok(())
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        Ok(self.store.list()?)
    }

    pub fn show_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        Ok(self.store.get(id)?)
    }

    /// Manual full sync. Unlike background pushes, failures reach the caller.
    pub fn refresh(&self) -> Result<ReconcileOutcome, AppError> {
        Ok(self.reconciler.full_sync()?)
    }

    /// Signs in, drops the previous user's local rows, then pulls this
    /// user's tasks. A failed pull is logged; the sign-in still stands.
    /// If the local rows cannot be dropped the session is signed out again.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<SignInSummary, AppError> {
        let (email, password) = required_credentials(email, password)?;
        self.auth
            .sign_in(&email, &password)
            .map_err(AppError::Auth)?;
        if let Err(err) = self.store.clear() {
            if let Err(sign_out_err) = self.auth.sign_out() {
                log::error!("could not undo sign-in after local clear failed: {sign_out_err}");
            }
            return Err(err.into());
        }

        let pull = match self.reconciler.full_sync() {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                log::warn!("post sign-in sync failed: {err}");
                None
            }
        };
        Ok(SignInSummary {
            identity: self.gate.current_identity(),
            pull,
        })
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<(), AppError> {
        let (email, password) = required_credentials(email, password)?;
        self.auth
            .sign_up(&email, &password)
            .map_err(AppError::Auth)
    }

    pub fn sign_out(&self) -> Result<(), AppError> {
        self.auth.sign_out().map_err(AppError::Auth)
    }

    pub fn whoami(&self) -> Option<Identity> {
        self.gate.current_identity()
    }

    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Waits for pushes still in flight. Call before the process exits.
    pub fn close(&self) -> Vec<PushOutcome> {
        self.engine.wait_idle()
    }
}

fn required_title(raw: &str) -> Result<String, AppError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::InvalidArgument(
            "title cannot be empty".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn required_credentials(email: &str, password: &str) -> Result<(String, String), AppError> {
    let email = email.trim();
    let password = password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::InvalidArgument(
            "email and password are required".to_string(),
        ));
    }
    Ok((email.to_string(), password.to_string()))
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Store(StoreError),
    Remote(RemoteError),
    Auth(RemoteError),
    Reconcile(ReconcileError),
    InvalidArgument(String),
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Store(err) => write!(f, "local store error: {}", err),
            AppError::Remote(err) => write!(f, "{}", err),
            AppError::Auth(err) => write!(f, "authentication failed: {}", err),
            AppError::Reconcile(err) => write!(f, "sync failed: {}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(id) => write!(f, "task '{}' not found in local store", id),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Remote(err) => Some(err),
            AppError::Auth(err) => Some(err),
            AppError::Reconcile(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::NotFound(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        AppError::Store(value)
    }
}

impl From<RemoteError> for AppError {
    fn from(value: RemoteError) -> Self {
        AppError::Remote(value)
    }
}

impl From<ReconcileError> for AppError {
    fn from(value: ReconcileError) -> Self {
        AppError::Reconcile(value)
    }
}
