use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::Result;
use crate::path::TaskPath;

/// How far a delete/restore propagated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub tasks: usize,
    pub links: usize,
}

/// Stamps every not-yet-deleted descendant of `root` with `stamp`, then every
/// live association touching the root or a descendant carrying that stamp.
/// The caller has already stamped the root task itself inside the same
/// transaction; a descendant that was independently deleted earlier keeps its
/// own marker and is skipped.
pub fn delete_subtree(
    conn: &Connection,
    user_id: i64,
    root: &TaskPath,
    stamp: &str,
) -> Result<CascadeOutcome> {
    let tasks = conn.execute(
        "UPDATE tasks SET deleted_at = ?1 \
         WHERE user_id = ?2 AND path LIKE ?3 AND deleted_at IS NULL",
        params![stamp, user_id, root.descendants_pattern()],
    )?;

    let links = conn.execute(
        "UPDATE pomodoro_task_links SET deleted_at = ?1 \
         WHERE deleted_at IS NULL AND task_id IN ( \
             SELECT id FROM tasks \
             WHERE user_id = ?2 AND (path = ?3 OR path LIKE ?4) AND deleted_at = ?1)",
        params![stamp, user_id, root.encode(), root.descendants_pattern()],
    )?;

    debug!(user_id, root = %root, tasks, links, "delete cascade");
    Ok(CascadeOutcome { tasks, links })
}

/// Reverse of `delete_subtree`: clears only markers equal to `stamp`, so
/// nodes and associations deleted by an unrelated operation stay deleted.
/// This stamp-equality guard is what makes the cascade reversible.
pub fn restore_subtree(
    conn: &Connection,
    user_id: i64,
    root: &TaskPath,
    stamp: &str,
) -> Result<CascadeOutcome> {
    let tasks = conn.execute(
        "UPDATE tasks SET deleted_at = NULL \
         WHERE user_id = ?1 AND path LIKE ?2 AND deleted_at = ?3",
        params![user_id, root.descendants_pattern(), stamp],
    )?;

    let links = conn.execute(
        "UPDATE pomodoro_task_links SET deleted_at = NULL \
         WHERE deleted_at = ?1 AND task_id IN ( \
             SELECT id FROM tasks \
             WHERE user_id = ?2 AND (path = ?3 OR path LIKE ?4))",
        params![stamp, user_id, root.encode(), root.descendants_pattern()],
    )?;

    debug!(user_id, root = %root, tasks, links, "restore cascade");
    Ok(CascadeOutcome { tasks, links })
}

/// Session-side of the same contract: deleting a session takes its live
/// associations with it under the session's stamp.
pub fn delete_session_links(conn: &Connection, session_id: i64, stamp: &str) -> Result<usize> {
    let links = conn.execute(
        "UPDATE pomodoro_task_links SET deleted_at = ?1 \
         WHERE session_id = ?2 AND deleted_at IS NULL",
        params![stamp, session_id],
    )?;
    Ok(links)
}

pub fn restore_session_links(conn: &Connection, session_id: i64, stamp: &str) -> Result<usize> {
    let links = conn.execute(
        "UPDATE pomodoro_task_links SET deleted_at = NULL \
         WHERE session_id = ?1 AND deleted_at = ?2",
        params![session_id, stamp],
    )?;
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::tempdir;

    const TS: &str = "2026-02-01T10:00:00+00:00";

    fn setup() -> (Connection, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let conn = crate::db::open(&dir.path().join("test.db")).unwrap();
        (conn, dir)
    }

    fn insert_task(conn: &Connection, id: i64, user_id: i64, path: &str, deleted_at: Option<&str>) {
        conn.execute(
            "INSERT INTO tasks (id, user_id, title, path, created_at, updated_at, deleted_at) \
             VALUES (?1, ?2, 'task', ?3, ?4, ?4, ?5)",
            params![id, user_id, path, TS, deleted_at],
        )
        .unwrap();
    }

    fn insert_link(conn: &Connection, id: i64, task_id: i64, deleted_at: Option<&str>) {
        conn.execute(
            "INSERT INTO pomodoro_sessions (id, user_id, start_time, duration, session_type, created_at) \
             VALUES (?1, 1, ?2, 1500, 'work', ?2) \
             ON CONFLICT (id) DO NOTHING",
            params![100 + id, TS],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO pomodoro_task_links (id, session_id, task_id, created_at, deleted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, 100 + id, task_id, TS, deleted_at],
        )
        .unwrap();
    }

    fn deleted_at(conn: &Connection, table: &str, id: i64) -> Option<String> {
        conn.query_row(
            &format!("SELECT deleted_at FROM {} WHERE id = ?1", table),
            [id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_delete_skips_already_deleted_descendants() {
        let (conn, _dir) = setup();
        insert_task(&conn, 1, 1, "1", None);
        insert_task(&conn, 2, 1, "1.2", None);
        insert_task(&conn, 3, 1, "1.2.3", Some("2026-01-01T00:00:00+00:00"));

        let stamp = "2026-03-01T00:00:00+00:00";
        let outcome = delete_subtree(&conn, 1, &TaskPath::root(1), stamp).unwrap();
        assert_eq!(outcome.tasks, 1);
        assert_eq!(deleted_at(&conn, "tasks", 2).as_deref(), Some(stamp));
        // The earlier independent delete keeps its own marker.
        assert_eq!(
            deleted_at(&conn, "tasks", 3).as_deref(),
            Some("2026-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_delete_ignores_other_owners_and_digit_neighbors() {
        let (conn, _dir) = setup();
        insert_task(&conn, 1, 1, "1", None);
        insert_task(&conn, 2, 1, "1.2", None);
        insert_task(&conn, 10, 1, "10", None);
        insert_task(&conn, 11, 1, "10.11", None);
        insert_task(&conn, 20, 2, "1.20", None); // same path shape, other owner

        let stamp = "2026-03-01T00:00:00+00:00";
        delete_subtree(&conn, 1, &TaskPath::root(1), stamp).unwrap();

        assert!(deleted_at(&conn, "tasks", 2).is_some());
        assert!(deleted_at(&conn, "tasks", 10).is_none());
        assert!(deleted_at(&conn, "tasks", 11).is_none());
        assert!(deleted_at(&conn, "tasks", 20).is_none());
    }

    #[test]
    fn test_delete_stamps_links_of_root_and_descendants() {
        let (conn, _dir) = setup();
        insert_task(&conn, 1, 1, "1", Some("2026-03-01T00:00:00+00:00"));
        insert_task(&conn, 2, 1, "1.2", None);
        insert_link(&conn, 1, 1, None);
        insert_link(&conn, 2, 2, None);

        let stamp = "2026-03-01T00:00:00+00:00";
        let outcome = delete_subtree(&conn, 1, &TaskPath::root(1), stamp).unwrap();
        assert_eq!(outcome.links, 2);
        assert_eq!(deleted_at(&conn, "pomodoro_task_links", 1).as_deref(), Some(stamp));
        assert_eq!(deleted_at(&conn, "pomodoro_task_links", 2).as_deref(), Some(stamp));
    }

    #[test]
    fn test_restore_only_clears_matching_stamp() {
        let (conn, _dir) = setup();
        let stamp = "2026-03-01T00:00:00+00:00";
        let other = "2026-02-15T00:00:00+00:00";
        insert_task(&conn, 1, 1, "1", Some(stamp));
        insert_task(&conn, 2, 1, "1.2", Some(stamp));
        insert_task(&conn, 3, 1, "1.3", Some(other));
        insert_link(&conn, 1, 2, Some(stamp));
        insert_link(&conn, 2, 3, Some(other));

        let outcome = restore_subtree(&conn, 1, &TaskPath::root(1), stamp).unwrap();
        assert_eq!(outcome, CascadeOutcome { tasks: 1, links: 1 });
        assert!(deleted_at(&conn, "tasks", 2).is_none());
        assert_eq!(deleted_at(&conn, "tasks", 3).as_deref(), Some(other));
        assert!(deleted_at(&conn, "pomodoro_task_links", 1).is_none());
        assert_eq!(deleted_at(&conn, "pomodoro_task_links", 2).as_deref(), Some(other));
    }

    #[test]
    fn test_session_link_cascade_round_trip() {
        let (conn, _dir) = setup();
        insert_task(&conn, 1, 1, "1", None);
        insert_link(&conn, 1, 1, None);
        insert_link(&conn, 2, 1, Some("2026-01-01T00:00:00+00:00"));
        // Both links on session 101 for this test.
        conn.execute("UPDATE pomodoro_task_links SET session_id = 101", [])
            .unwrap();

        let stamp = "2026-03-01T00:00:00+00:00";
        assert_eq!(delete_session_links(&conn, 101, stamp).unwrap(), 1);
        assert_eq!(restore_session_links(&conn, 101, stamp).unwrap(), 1);
        assert!(deleted_at(&conn, "pomodoro_task_links", 1).is_none());
        assert_eq!(
            deleted_at(&conn, "pomodoro_task_links", 2).as_deref(),
            Some("2026-01-01T00:00:00+00:00")
        );
    }
}
