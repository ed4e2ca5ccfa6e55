use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db;
use crate::domain::task::{new_task_id, Task, TaskPatch};

/// Shared handle to the local task table.
///
/// Every clone talks to the same connection; the mutex serializes local
/// writes coming from the caller thread and from background pushes.
#[derive(Clone)]
pub struct TaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl TaskStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        ensure_parent_dir(db_path)?;
        let conn = db::open_connection(db_path)?;
        Ok(Self::from_connection(conn))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(op(&mut guard)?)
    }

    pub fn create(&self, title: &str, description: &str) -> Result<String, StoreError> {
        let id = new_task_id();
        self.with_conn(|conn| db::insert_task(conn, &id, title, description))?;
        Ok(id)
    }

    pub fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.with_conn(|conn| db::list_tasks(conn))
    }

    pub fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        self.with_conn(|conn| db::get_task(conn, id))
    }

    /// Partial update; always leaves the row dirty. Returns false when the id
    /// is unknown.
    pub fn update(&self, id: &str, patch: &TaskPatch) -> Result<bool, StoreError> {
        self.with_conn(|conn| db::update_task(conn, id, patch))
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| db::delete_task(conn, id))
    }

    pub fn mark_synced(&self, id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| db::mark_synced(conn, id))
    }

    pub fn replace_all(&self, records: &[Task]) -> Result<usize, StoreError> {
        self.with_conn(|conn| db::replace_all(conn, records))
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| db::clear_tasks(conn))
    }

    /// Drops the task table so every later statement fails.
    #[cfg(test)]
    pub fn drop_table_for_tests(&self) {
        self.with_conn(|conn| conn.execute_batch("DROP TABLE tasks"))
            .expect("drop table should succeed");
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), StoreError> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    LockPoisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "I/O error: {}", err),
            StoreError::Db(err) => write!(f, "database error: {}", err),
            StoreError::LockPoisoned => write!(f, "local store lock was poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Db(err) => Some(err),
            StoreError::LockPoisoned => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Db(value)
    }
}
