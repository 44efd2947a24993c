use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::error::{Result, StoreError};
use crate::models::{
    HistoryAction, HistoryEntry, Priority, Session, SessionKind, Status, Task, TaskLink,
};

const SCHEMA_VERSION: i32 = 1;

/// Columns shared by every task SELECT, in `task_from_row` order.
pub(crate) const TASK_COLS: &str = "id, user_id, title, description, priority, status, \
     parent_id, path, color_code, estimated_duration, \
     created_at, updated_at, completed_at, deleted_at";

pub(crate) const SESSION_COLS: &str = "id, user_id, start_time, end_time, duration, \
     actual_duration, session_type, completed, interruption_reason, created_at, deleted_at";

pub(crate) const LINK_COLS: &str =
    "id, session_id, task_id, time_spent, notes, created_at, deleted_at";

/// Opens (creating if needed) the store database and brings the schema up
/// to date. WAL plus a busy timeout lets concurrent writers queue instead of
/// failing immediately; a writer that still cannot get the lock surfaces as
/// `ConcurrentModificationError` (see `error.rs`).
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    let version: i32 =
        conn.query_row("SELECT user_version FROM pragma_user_version", [], |row| row.get(0))?;

    if version < SCHEMA_VERSION {
        conn.execute_batch(
            r#"
            -- Task forest. path materializes the ancestor chain and is
            -- maintained by the store, never written by callers.
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                priority TEXT CHECK (priority IN ('high', 'medium', 'low')),
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'in_progress', 'completed', 'blocked')),
                parent_id INTEGER,
                path TEXT NOT NULL DEFAULT '',
                color_code TEXT,
                estimated_duration INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT,
                deleted_at TEXT,
                FOREIGN KEY (parent_id) REFERENCES tasks(id) ON DELETE CASCADE,
                CHECK (parent_id IS NULL OR parent_id != id)
            );

            CREATE TABLE IF NOT EXISTS pomodoro_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration INTEGER NOT NULL,
                actual_duration INTEGER,
                session_type TEXT NOT NULL
                    CHECK (session_type IN ('work', 'short_break', 'long_break')),
                completed INTEGER NOT NULL DEFAULT 0,
                interruption_reason TEXT,
                created_at TEXT NOT NULL,
                deleted_at TEXT,
                CHECK (end_time IS NULL OR end_time > start_time)
            );

            -- Session/task many-to-many, soft-deletable from either side
            CREATE TABLE IF NOT EXISTS pomodoro_task_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                task_id INTEGER NOT NULL,
                time_spent INTEGER,
                notes TEXT,
                created_at TEXT NOT NULL,
                deleted_at TEXT,
                FOREIGN KEY (session_id) REFERENCES pomodoro_sessions(id) ON DELETE CASCADE,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            -- Append-only audit log; rows are never updated or deleted
            CREATE TABLE IF NOT EXISTS task_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                action TEXT NOT NULL
                    CHECK (action IN ('created', 'updated', 'soft_deleted', 'restored')),
                changes TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_path ON tasks(path);
            CREATE INDEX IF NOT EXISTS idx_tasks_deleted ON tasks(deleted_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON pomodoro_sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_links_session ON pomodoro_task_links(session_id);
            CREATE INDEX IF NOT EXISTS idx_links_task ON pomodoro_task_links(task_id);
            CREATE INDEX IF NOT EXISTS idx_history_task ON task_history(task_id);
            "#,
        )?;

        conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
    }

    conn.execute("PRAGMA foreign_keys = ON", [])?;

    Ok(())
}

pub(crate) fn now_stamp() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn conv_err(idx: usize, err: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let priority = row
        .get::<_, Option<String>>(4)?
        .map(|s| Priority::parse(&s).map_err(|e| conv_err(4, e)))
        .transpose()?;
    let status =
        Status::parse(&row.get::<_, String>(5)?).map_err(|e| conv_err(5, e))?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority,
        status,
        parent_id: row.get(6)?,
        path: row.get(7)?,
        color_code: row.get(8)?,
        estimated_duration: row.get(9)?,
        created_at: parse_ts(row.get::<_, String>(10)?),
        updated_at: parse_ts(row.get::<_, String>(11)?),
        completed_at: row.get::<_, Option<String>>(12)?.map(parse_ts),
        deleted_at: row.get::<_, Option<String>>(13)?.map(parse_ts),
    })
}

pub(crate) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let session_type =
        SessionKind::parse(&row.get::<_, String>(6)?).map_err(|e| conv_err(6, e))?;
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        start_time: parse_ts(row.get::<_, String>(2)?),
        end_time: row.get::<_, Option<String>>(3)?.map(parse_ts),
        duration: row.get(4)?,
        actual_duration: row.get(5)?,
        session_type,
        completed: row.get(7)?,
        interruption_reason: row.get(8)?,
        created_at: parse_ts(row.get::<_, String>(9)?),
        deleted_at: row.get::<_, Option<String>>(10)?.map(parse_ts),
    })
}

pub(crate) fn link_from_row(row: &Row<'_>) -> rusqlite::Result<TaskLink> {
    Ok(TaskLink {
        id: row.get(0)?,
        session_id: row.get(1)?,
        task_id: row.get(2)?,
        time_spent: row.get(3)?,
        notes: row.get(4)?,
        created_at: parse_ts(row.get::<_, String>(5)?),
        deleted_at: row.get::<_, Option<String>>(6)?.map(parse_ts),
    })
}

pub(crate) fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let action =
        HistoryAction::parse(&row.get::<_, String>(3)?).map_err(|e| conv_err(3, e))?;
    let changes: crate::history::ChangeSet =
        serde_json::from_str(&row.get::<_, String>(4)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        action,
        changes,
        timestamp: parse_ts(row.get::<_, String>(5)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_schema() {
        let dir = tempdir().unwrap();
        let conn = open(&dir.path().join("test.db")).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('tasks', 'pomodoro_sessions', 'pomodoro_task_links', 'task_history')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        drop(open(&db_path).unwrap());
        // Re-opening an existing database must not fail or reset data.
        let conn = open(&db_path).unwrap();
        let version: i32 = conn
            .query_row("SELECT * FROM pragma_user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_ts_round_trip() {
        let now = Utc::now();
        assert_eq!(parse_ts(format_ts(&now)), now);
    }

    #[test]
    fn test_status_check_constraint() {
        let dir = tempdir().unwrap();
        let conn = open(&dir.path().join("test.db")).unwrap();
        let result = conn.execute(
            "INSERT INTO tasks (user_id, title, status, path, created_at, updated_at) \
             VALUES (1, 'x', 'bogus', '1', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
            [],
        );
        assert!(result.is_err());
    }
}
