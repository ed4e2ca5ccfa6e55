use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::task::{Task, TaskPatch};

pub mod sqlite;

pub use sqlite::SqliteRemote;

/// Row shape shared with the remote `tasks` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteTask {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl RemoteTask {
    pub fn from_task(task: &Task, user_id: &str) -> Self {
        Self {
            id: task.id.clone(),
            user_id: user_id.to_string(),
            title: task.title.clone(),
            description: Some(task.description.clone()),
            completed: task.completed,
        }
    }

    /// Local copy of a pulled row; pulled rows are by definition in sync.
    pub fn into_synced_task(self) -> Task {
        Task {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            completed: self.completed,
            synced: true,
        }
    }
}

/// Column changes for a point update. Absent fields are not sent.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RemoteChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl From<&TaskPatch> for RemoteChanges {
    fn from(value: &TaskPatch) -> Self {
        Self {
            title: value.title.clone(),
            description: value.description.clone(),
            completed: value.completed,
        }
    }
}

/// Remote multi-user task table. Point operations always filter on both the
/// row id and the owning user id.
pub trait RemoteStore: Send + Sync {
    fn insert(&self, row: &RemoteTask) -> Result<(), RemoteError>;
    fn update(&self, id: &str, user_id: &str, changes: &RemoteChanges) -> Result<(), RemoteError>;
    fn delete(&self, id: &str, user_id: &str) -> Result<(), RemoteError>;
    fn select_for_user(&self, user_id: &str) -> Result<Vec<RemoteTask>, RemoteError>;
}

#[derive(Debug)]
pub enum RemoteError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Json(serde_json::Error),
    Unavailable(String),
    InvalidCredentials,
    AccountExists(String),
    NotSignedIn,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Io(err) => write!(f, "remote I/O error: {}", err),
            RemoteError::Db(err) => write!(f, "remote database error: {}", err),
            RemoteError::Json(err) => write!(f, "remote payload error: {}", err),
            RemoteError::Unavailable(message) => write!(f, "remote unavailable: {}", message),
            RemoteError::InvalidCredentials => write!(f, "invalid email or password"),
            RemoteError::AccountExists(email) => {
                write!(f, "an account for '{}' already exists", email)
            }
            RemoteError::NotSignedIn => write!(f, "no user is signed in"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RemoteError::Io(err) => Some(err),
            RemoteError::Db(err) => Some(err),
            RemoteError::Json(err) => Some(err),
            RemoteError::Unavailable(_) => None,
            RemoteError::InvalidCredentials => None,
            RemoteError::AccountExists(_) => None,
            RemoteError::NotSignedIn => None,
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(value: std::io::Error) -> Self {
        RemoteError::Io(value)
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        RemoteError::Db(value)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(value: serde_json::Error) -> Self {
        RemoteError::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteChanges, RemoteTask};
    use crate::domain::task::TaskPatch;
    use serde_json::json;

    #[test]
    fn changes_serialize_only_supplied_fields() {
        let changes = RemoteChanges::from(&TaskPatch::completed());
        let value = serde_json::to_value(&changes).expect("changes should serialize");
        assert_eq!(value, json!({ "completed": true }));
    }

    #[test]
    fn pulled_rows_tolerate_missing_description() {
        let row: RemoteTask = serde_json::from_value(json!({
            "id": "t-1",
            "user_id": "u-1",
            "title": "From server",
            "description": null
        }))
        .expect("row should deserialize");

        let task = row.into_synced_task();
        assert_eq!(task.description, "");
        assert!(!task.completed);
        assert!(task.synced);
    }
}
