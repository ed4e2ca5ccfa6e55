use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{RemoteChanges, RemoteError, RemoteStore, RemoteTask};
use crate::session::AuthProvider;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_salt TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS remote_tasks (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    completed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_remote_tasks_user_id ON remote_tasks(user_id);
"#;

/// Multi-user backend kept in a SQLite file that several local stores can
/// share. The signed-in session is a small JSON file next to the local
/// store, written in the `{"data": {"user": ..}}` envelope shape.
pub struct SqliteRemote {
    conn: Mutex<Connection>,
    session_path: PathBuf,
}

impl SqliteRemote {
    pub fn open(db_path: &str, session_path: PathBuf) -> Result<Self, RemoteError> {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            session_path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RemoteError> {
        self.conn
            .lock()
            .map_err(|_| RemoteError::Unavailable("remote connection lock poisoned".to_string()))
    }

    fn write_session(&self, user_id: &str, email: &str) -> Result<(), RemoteError> {
        if let Some(parent) = self.session_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let session = json!({
            "data": {
                "user": { "id": user_id, "email": email }
            },
            "signed_in_at": now_utc_rfc3339(),
        });
        std::fs::write(&self.session_path, serde_json::to_vec_pretty(&session)?)?;
        Ok(())
    }
}

impl RemoteStore for SqliteRemote {
    fn insert(&self, row: &RemoteTask) -> Result<(), RemoteError> {
        self.lock()?.execute(
            r#"
INSERT INTO remote_tasks (id, user_id, title, description, completed)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                row.id,
                row.user_id,
                row.title,
                row.description,
                row.completed
            ],
        )?;
        Ok(())
    }

    fn update(&self, id: &str, user_id: &str, changes: &RemoteChanges) -> Result<(), RemoteError> {
        self.lock()?.execute(
            r#"
UPDATE remote_tasks SET
    title = COALESCE(?1, title),
    description = COALESCE(?2, description),
    completed = COALESCE(?3, completed)
WHERE id = ?4 AND user_id = ?5
"#,
            params![
                changes.title,
                changes.description,
                changes.completed,
                id,
                user_id
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str, user_id: &str) -> Result<(), RemoteError> {
        self.lock()?.execute(
            "DELETE FROM remote_tasks WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(())
    }

    /// Rows come back oldest first so a full pull rebuilds the local
    /// newest-first listing.
    fn select_for_user(&self, user_id: &str) -> Result<Vec<RemoteTask>, RemoteError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
SELECT id, user_id, title, description, completed
FROM remote_tasks
WHERE user_id = ?1
ORDER BY rowid ASC
"#,
        )?;
        let mut rows = stmt.query(params![user_id])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(RemoteTask {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                completed: row.get(4)?,
            });
        }
        Ok(result)
    }
}

impl AuthProvider for SqliteRemote {
    fn get_current_user(&self) -> Result<Option<Value>, RemoteError> {
        match std::fs::read(&self.session_path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        let email = normalize_email(email);
        let account: Option<(String, String, String)> = self
            .lock()?
            .query_row(
                "SELECT id, password_salt, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match account {
            Some((user_id, salt, hash)) if hash_password(&salt, password) == hash => {
                self.write_session(&user_id, &email)?;
                log::info!("signed in as {email}");
                Ok(())
            }
            _ => Err(RemoteError::InvalidCredentials),
        }
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        let email = normalize_email(email);
        let conn = self.lock()?;
        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(RemoteError::AccountExists(email));
        }

        let salt = Uuid::now_v7().simple().to_string();
        conn.execute(
            r#"
INSERT INTO users (id, email, password_salt, password_hash, created_at)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                Uuid::now_v7().to_string(),
                email,
                salt,
                hash_password(&salt, password),
                now_utc_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn sign_out(&self) -> Result<(), RemoteError> {
        match std::fs::remove_file(&self.session_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::debug!("sign out requested with no active session");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"|");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}
