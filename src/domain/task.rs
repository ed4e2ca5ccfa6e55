use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One task as stored locally.
///
/// `synced` is local metadata only: it never travels to the remote store and
/// is true only while the local row is believed to match the remote row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub synced: bool,
}

/// Field-level change set for a task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Self::default()
        }
    }

    pub fn has_changes(&self) -> bool {
        self.title.is_some() || self.description.is_some() || self.completed.is_some()
    }
}

pub fn new_task_id() -> String {
    Uuid::now_v7().to_string()
}
