use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};

use crate::domain::task::{Task, TaskPatch};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    completed INTEGER NOT NULL DEFAULT 0,
    synced INTEGER NOT NULL DEFAULT 0
);
"#;

pub fn open_connection(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn task_from_row(row: &Row<'_>) -> Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        completed: row.get(3)?,
        synced: row.get(4)?,
    })
}

pub fn insert_task(conn: &Connection, id: &str, title: &str, description: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO tasks (id, title, description, completed, synced)
VALUES (?1, ?2, ?3, 0, 0)
"#,
        params![id, title, description],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    conn.query_row(
        "SELECT id, title, description, completed, synced FROM tasks WHERE id = ?1",
        params![id],
        task_from_row,
    )
    .optional()
}

/// Newest first: rows come back in reverse insertion order.
pub fn list_tasks(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, completed, synced FROM tasks ORDER BY rowid DESC",
    )?;

    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(task_from_row(row)?);
    }

    Ok(result)
}

/// Applies the supplied fields and clears `synced` in one transaction.
/// Returns false when no row has the given id.
pub fn update_task(conn: &mut Connection, id: &str, patch: &TaskPatch) -> Result<bool> {
    let tx = conn.transaction()?;
    if let Some(title) = patch.title.as_deref() {
        tx.execute(
            "UPDATE tasks SET title = ?1 WHERE id = ?2",
            params![title, id],
        )?;
    }
    if let Some(description) = patch.description.as_deref() {
        tx.execute(
            "UPDATE tasks SET description = ?1 WHERE id = ?2",
            params![description, id],
        )?;
    }
    if let Some(completed) = patch.completed {
        tx.execute(
            "UPDATE tasks SET completed = ?1 WHERE id = ?2",
            params![completed, id],
        )?;
    }
    let touched = tx.execute("UPDATE tasks SET synced = 0 WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(touched > 0)
}

pub fn delete_task(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn mark_synced(conn: &Connection, id: &str) -> Result<bool> {
    let touched = conn.execute("UPDATE tasks SET synced = 1 WHERE id = ?1", params![id])?;
    Ok(touched > 0)
}

/// Clears the table and inserts `records` in order. Any failure rolls the
/// whole replacement back, leaving the previous rows in place.
pub fn replace_all(conn: &mut Connection, records: &[Task]) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM tasks", [])?;
    {
        let mut stmt = tx.prepare(
            r#"
INSERT INTO tasks (id, title, description, completed, synced)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
        )?;
        for record in records {
            stmt.execute(params![
                record.id,
                record.title,
                record.description,
                record.completed,
                record.synced
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

pub fn clear_tasks(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM tasks", [])?;
    Ok(())
}
