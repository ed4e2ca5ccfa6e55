use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::remote::{RemoteChanges, RemoteError, RemoteStore, RemoteTask};
use crate::session::AuthProvider;

/// In-process remote used by unit tests: rows live in a vector, every call is
/// recorded, and reads/writes/auth lookups can be made to fail.
#[derive(Default)]
pub struct FakeRemote {
    rows: Mutex<Vec<RemoteTask>>,
    user: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_auth: AtomicBool,
}

impl FakeRemote {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: &str) -> Self {
        let remote = Self::default();
        *remote.user.lock().expect("user lock") = Some(user_id.to_string());
        remote
    }

    pub fn sign_out_now(&self) {
        *self.user.lock().expect("user lock") = None;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_auth_lookups(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn seed(&self, row: RemoteTask) {
        self.rows.lock().expect("rows lock").push(row);
    }

    pub fn rows(&self) -> Vec<RemoteTask> {
        self.rows.lock().expect("rows lock").clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn check_writes(&self) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

pub fn remote_row(id: &str, user_id: &str, title: &str) -> RemoteTask {
    RemoteTask {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: None,
        completed: false,
    }
}

impl RemoteStore for FakeRemote {
    fn insert(&self, row: &RemoteTask) -> Result<(), RemoteError> {
        self.record(format!("insert {} user={}", row.id, row.user_id));
        self.check_writes()?;
        self.rows.lock().expect("rows lock").push(row.clone());
        Ok(())
    }

    fn update(&self, id: &str, user_id: &str, changes: &RemoteChanges) -> Result<(), RemoteError> {
        self.record(format!("update {id} user={user_id}"));
        self.check_writes()?;
        let mut rows = self.rows.lock().expect("rows lock");
        for row in rows
            .iter_mut()
            .filter(|row| row.id == id && row.user_id == user_id)
        {
            if let Some(title) = changes.title.as_ref() {
                row.title = title.clone();
            }
            if let Some(description) = changes.description.as_ref() {
                row.description = Some(description.clone());
            }
            if let Some(completed) = changes.completed {
                row.completed = completed;
            }
        }
        Ok(())
    }

    fn delete(&self, id: &str, user_id: &str) -> Result<(), RemoteError> {
        self.record(format!("delete {id} user={user_id}"));
        self.check_writes()?;
        self.rows
            .lock()
            .expect("rows lock")
            .retain(|row| !(row.id == id && row.user_id == user_id));
        Ok(())
    }

    fn select_for_user(&self, user_id: &str) -> Result<Vec<RemoteTask>, RemoteError> {
        self.record(format!("select user={user_id}"));
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("injected read failure".to_string()));
        }
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl AuthProvider for FakeRemote {
    fn get_current_user(&self) -> Result<Option<Value>, RemoteError> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("injected auth failure".to_string()));
        }
        let user = self.user.lock().expect("user lock").clone();
        Ok(user.map(|id| json!({ "user": { "id": id } })))
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        if password != "secret" {
            return Err(RemoteError::InvalidCredentials);
        }
        *self.user.lock().expect("user lock") = Some(format!("user-{email}"));
        Ok(())
    }

    fn sign_up(&self, email: &str, _password: &str) -> Result<(), RemoteError> {
        if email == "taken@example.com" {
            return Err(RemoteError::AccountExists(email.to_string()));
        }
        Ok(())
    }

    fn sign_out(&self) -> Result<(), RemoteError> {
        self.sign_out_now();
        Ok(())
    }
}
