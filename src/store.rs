use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

use crate::cascade;
use crate::db::{self, LINK_COLS, SESSION_COLS, TASK_COLS};
use crate::error::{Result, StoreError};
use crate::history::{self, ChangeSet, FieldValue};
use crate::models::{
    HistoryAction, HistoryEntry, NewSession, NewTask, Session, SessionFilter, SessionKind,
    Status, Task, TaskLink, TaskPatch, TreeRow,
};
use crate::path::TaskPath;

/// Owner-scoped, transactional facade over the hierarchical task store.
/// Every mutating entry point runs as one IMMEDIATE transaction: path
/// maintenance, cascade propagation, and history recording commit together
/// or not at all.
pub struct TaskStore {
    conn: Connection,
}

impl TaskStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(TaskStore { conn: db::open(path)? })
    }

    // ---- task CRUD -----------------------------------------------------

    pub fn create_task(&mut self, user_id: i64, new: NewTask) -> Result<Task> {
        if new.title.trim().is_empty() {
            return Err(StoreError::InvalidAttribute {
                field: "title",
                value: new.title,
            });
        }
        if let Some(d) = new.estimated_duration.filter(|d| *d <= 0) {
            return Err(StoreError::InvalidAttribute {
                field: "estimated_duration",
                value: d.to_string(),
            });
        }

        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let parent_path = match new.parent_id {
            Some(pid) => Some(require_parent(&tx, user_id, pid)?),
            None => None,
        };

        let now = db::now_stamp();
        let status = new.status.unwrap_or(Status::Pending);
        // completed_at is derived from status, here as on every transition
        let completed_at = (status == Status::Completed).then(|| now.clone());
        tx.execute(
            "INSERT INTO tasks (user_id, title, description, priority, status, parent_id, \
                                color_code, estimated_duration, created_at, updated_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)",
            params![
                user_id,
                new.title,
                new.description,
                new.priority.map(|p| p.as_str()),
                status.as_str(),
                new.parent_id,
                new.color_code,
                new.estimated_duration,
                now,
                completed_at,
            ],
        )?;
        let id = tx.last_insert_rowid();

        let path = match &parent_path {
            Some(parent) => parent.child(id),
            None => TaskPath::root(id),
        };
        tx.execute(
            "UPDATE tasks SET path = ?1 WHERE id = ?2",
            params![path.encode(), id],
        )?;

        let task = fetch_task(&tx, user_id, id, true)?;
        history::record(
            &tx,
            id,
            user_id,
            history::classify(None, &task),
            &history::creation_changes(&task),
        )?;

        tx.commit()?;
        info!(user_id, task_id = id, path = %path, "created task");
        Ok(task)
    }

    pub fn get_task(&self, user_id: i64, id: i64) -> Result<Task> {
        fetch_task(&self.conn, user_id, id, false)
    }

    /// Lists direct children of `parent_id`, or root tasks when it is `None`.
    pub fn list_tasks(
        &self,
        user_id: i64,
        parent_id: Option<i64>,
        status: Option<Status>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>> {
        let mut sql = format!(
            "SELECT {} FROM tasks WHERE user_id = ? AND deleted_at IS NULL",
            TASK_COLS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        match parent_id {
            Some(pid) => {
                sql.push_str(" AND parent_id = ?");
                params_vec.push(Box::new(pid));
            }
            None => sql.push_str(" AND parent_id IS NULL"),
        }
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(status.as_str()));
        }
        sql.push_str(" ORDER BY id LIMIT ? OFFSET ?");
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let tasks = stmt
            .query_map(params_refs.as_slice(), db::task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Applies non-structural edits. A status transition into `completed`
    /// stamps `completed_at`; the reverse transition clears it. An edit that
    /// changes nothing writes no row and no history entry.
    pub fn edit_task(&mut self, user_id: i64, id: i64, patch: TaskPatch) -> Result<Task> {
        if let Some(title) = patch.title.as_deref() {
            if title.trim().is_empty() {
                return Err(StoreError::InvalidAttribute {
                    field: "title",
                    value: title.to_string(),
                });
            }
        }
        if let Some(d) = patch.estimated_duration.filter(|d| *d <= 0) {
            return Err(StoreError::InvalidAttribute {
                field: "estimated_duration",
                value: d.to_string(),
            });
        }

        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let before = fetch_task(&tx, user_id, id, false)?;

        let mut after = before.clone();
        if let Some(title) = patch.title {
            after.title = title;
        }
        if let Some(description) = patch.description {
            after.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            after.priority = Some(priority);
        }
        if let Some(status) = patch.status {
            after.status = status;
        }
        if let Some(color_code) = patch.color_code {
            after.color_code = Some(color_code);
        }
        if let Some(estimated_duration) = patch.estimated_duration {
            after.estimated_duration = Some(estimated_duration);
        }

        let now = Utc::now();
        if after.status == Status::Completed && before.status != Status::Completed {
            after.completed_at = Some(now);
        } else if after.status != Status::Completed && before.status == Status::Completed {
            after.completed_at = None;
        }

        let changes = history::diff(&before, &after);
        if changes.is_empty() {
            return Ok(before);
        }

        after.updated_at = now;
        tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, status = ?4, \
                 color_code = ?5, estimated_duration = ?6, completed_at = ?7, updated_at = ?8 \
             WHERE id = ?9",
            params![
                after.title,
                after.description,
                after.priority.map(|p| p.as_str()),
                after.status.as_str(),
                after.color_code,
                after.estimated_duration,
                after.completed_at.as_ref().map(db::format_ts),
                db::format_ts(&after.updated_at),
                id,
            ],
        )?;
        history::record(&tx, id, user_id, history::classify(Some(&before), &after), &changes)?;

        tx.commit()?;
        Ok(after)
    }

    /// Reparents a task, rewriting the materialized path of the whole
    /// subtree atomically. Moving to the current parent is a no-op and
    /// leaves no history entry.
    pub fn move_task(&mut self, user_id: i64, id: i64, new_parent: Option<i64>) -> Result<Task> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let before = fetch_task(&tx, user_id, id, false)?;
        if before.parent_id == new_parent {
            return Ok(before);
        }

        let old_path = decode_path(&before.path)?;
        let new_path = match new_parent {
            Some(pid) => {
                if pid == id {
                    return Err(StoreError::Cycle { task_id: id, parent_id: pid });
                }
                let parent_path = require_parent(&tx, user_id, pid)?;
                // Cycle check against the candidate parent's current path:
                // a descendant of the moved task still carries its old prefix.
                if old_path.is_prefix_of(&parent_path) {
                    return Err(StoreError::Cycle { task_id: id, parent_id: pid });
                }
                parent_path.child(id)
            }
            None => TaskPath::root(id),
        };

        // Rewrite every descendant (soft-deleted ones included; the path
        // invariant holds for the whole subtree) before touching the task.
        let descendants: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, path FROM tasks WHERE user_id = ?1 AND path LIKE ?2",
            )?;
            let rows = stmt
                .query_map(
                    params![user_id, old_path.descendants_pattern()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        {
            let mut update = tx.prepare("UPDATE tasks SET path = ?1 WHERE id = ?2")?;
            for (desc_id, desc_path) in &descendants {
                let rewritten = decode_path(desc_path)?
                    .replace_prefix(&old_path, &new_path)
                    .ok_or(StoreError::InvalidPath {
                        path: desc_path.clone(),
                        reason: "descendant lost its subtree prefix",
                    })?;
                update.execute(params![rewritten.encode(), desc_id])?;
            }
        }

        let now = db::now_stamp();
        tx.execute(
            "UPDATE tasks SET parent_id = ?1, path = ?2, updated_at = ?3 WHERE id = ?4",
            params![new_parent, new_path.encode(), now, id],
        )?;

        let mut changes = ChangeSet::new();
        changes.push(
            "parent_id",
            FieldValue::int(before.parent_id),
            FieldValue::int(new_parent),
        );
        changes.push(
            "path",
            FieldValue::text(Some(&before.path)),
            FieldValue::text(Some(&new_path.encode())),
        );
        history::record(&tx, id, user_id, HistoryAction::Updated, &changes)?;

        let task = fetch_task(&tx, user_id, id, false)?;
        tx.commit()?;
        info!(
            user_id,
            task_id = id,
            from = %old_path,
            to = %new_path,
            descendants = descendants.len(),
            "moved task"
        );
        Ok(task)
    }

    /// Soft-deletes a task and cascades the same deletion stamp to its live
    /// descendants and their session associations. Deleting an already
    /// deleted task is a no-op.
    pub fn delete_task(&mut self, user_id: i64, id: i64) -> Result<()> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let before = fetch_task(&tx, user_id, id, true)?;
        if before.deleted_at.is_some() {
            return Ok(());
        }

        let path = decode_path(&before.path)?;
        let stamp = db::now_stamp();
        tx.execute(
            "UPDATE tasks SET deleted_at = ?1 WHERE id = ?2",
            params![stamp, id],
        )?;
        let outcome = cascade::delete_subtree(&tx, user_id, &path, &stamp)?;

        let mut after = before.clone();
        after.deleted_at = Some(db::parse_ts(stamp.clone()));
        history::record(
            &tx,
            id,
            user_id,
            history::classify(Some(&before), &after),
            &history::diff(&before, &after),
        )?;

        tx.commit()?;
        info!(
            user_id,
            task_id = id,
            descendants = outcome.tasks,
            links = outcome.links,
            "soft-deleted task"
        );
        Ok(())
    }

    /// Clears the deletion marker and, guarded by stamp equality, the markers
    /// the original delete cascaded onto descendants and associations. The
    /// parent is left alone: restore never cascades upward.
    pub fn restore_task(&mut self, user_id: i64, id: i64) -> Result<Task> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let before = fetch_task(&tx, user_id, id, true)?;
        let Some(deleted_at) = before.deleted_at else {
            return Ok(before);
        };

        let path = decode_path(&before.path)?;
        let stamp = db::format_ts(&deleted_at);
        tx.execute("UPDATE tasks SET deleted_at = NULL WHERE id = ?1", [id])?;
        let outcome = cascade::restore_subtree(&tx, user_id, &path, &stamp)?;

        let mut after = before.clone();
        after.deleted_at = None;
        history::record(
            &tx,
            id,
            user_id,
            history::classify(Some(&before), &after),
            &history::diff(&before, &after),
        )?;

        tx.commit()?;
        info!(
            user_id,
            task_id = id,
            descendants = outcome.tasks,
            links = outcome.links,
            "restored task"
        );
        Ok(after)
    }

    // ---- queries -------------------------------------------------------

    /// Non-deleted ancestors-or-self, root to leaf. `level` is absolute
    /// depth minus one, so a gap left by an independently deleted ancestor
    /// stays visible in the numbering.
    pub fn breadcrumb(&self, user_id: i64, id: i64) -> Result<Vec<TreeRow>> {
        let task = fetch_task(&self.conn, user_id, id, false)?;
        let path = decode_path(&task.path)?;

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];
        for segment in path.segments() {
            params_vec.push(Box::new(*segment));
        }
        let placeholders = vec!["?"; path.depth()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, title FROM tasks \
             WHERE user_id = ? AND deleted_at IS NULL AND id IN ({})",
            placeholders
        ))?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let found: Vec<(i64, String)> = stmt
            .query_map(params_refs.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(path.depth());
        for (level, ancestor_id) in path.segments().iter().enumerate() {
            if let Some((id, title)) = found.iter().find(|(id, _)| id == ancestor_id) {
                rows.push(TreeRow {
                    id: *id,
                    title: title.clone(),
                    level: level as i64,
                });
            }
        }
        Ok(rows)
    }

    /// Non-deleted strict descendants in path order, `level` relative to the
    /// queried task (direct children are level 1).
    pub fn subtree(&self, user_id: i64, id: i64) -> Result<Vec<TreeRow>> {
        let task = fetch_task(&self.conn, user_id, id, false)?;
        let root = decode_path(&task.path)?;

        let mut stmt = self.conn.prepare(
            "SELECT id, title, path FROM tasks \
             WHERE user_id = ?1 AND deleted_at IS NULL AND path LIKE ?2",
        )?;
        let mut rows: Vec<(TaskPath, i64, String)> = Vec::new();
        for row in stmt.query_map(params![user_id, root.descendants_pattern()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })? {
            let (id, title, encoded) = row?;
            rows.push((decode_path(&encoded)?, id, title));
        }
        // Segment-wise order, so task 10 lists after task 2, not before.
        rows.sort();

        Ok(rows
            .into_iter()
            .map(|(path, id, title)| TreeRow {
                id,
                title,
                level: (path.depth() - root.depth()) as i64,
            })
            .collect())
    }

    /// Strict-descendant predicate over non-deleted tasks. Missing or
    /// deleted tasks, and the task itself, answer false.
    pub fn is_descendant(&self, user_id: i64, candidate_id: i64, ancestor_id: i64) -> Result<bool> {
        if candidate_id == ancestor_id {
            return Ok(false);
        }
        let (Some(candidate), Some(ancestor)) = (
            maybe_fetch_task(&self.conn, user_id, candidate_id)?,
            maybe_fetch_task(&self.conn, user_id, ancestor_id)?,
        ) else {
            return Ok(false);
        };
        let candidate_path = decode_path(&candidate.path)?;
        let ancestor_path = decode_path(&ancestor.path)?;
        Ok(ancestor_path.is_prefix_of(&candidate_path)
            && candidate_path.depth() > ancestor_path.depth())
    }

    /// Owner+task-scoped page of the audit log, newest first. Works for
    /// soft-deleted tasks too; history outlives normal navigation.
    pub fn task_history(
        &self,
        user_id: i64,
        task_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoryEntry>> {
        fetch_task(&self.conn, user_id, task_id, true)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, user_id, action, changes, timestamp FROM task_history \
             WHERE task_id = ?1 AND user_id = ?2 \
             ORDER BY timestamp DESC, id DESC LIMIT ?3 OFFSET ?4",
        )?;
        let entries = stmt
            .query_map(params![task_id, user_id, limit, offset], db::history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ---- pomodoro sessions --------------------------------------------

    pub fn create_session(&mut self, user_id: i64, new: NewSession) -> Result<Session> {
        if new.duration <= 0 {
            return Err(StoreError::InvalidAttribute {
                field: "duration",
                value: new.duration.to_string(),
            });
        }
        let start = new.start_time.unwrap_or_else(Utc::now);
        let kind = new.session_type.unwrap_or(SessionKind::Work);
        self.conn.execute(
            "INSERT INTO pomodoro_sessions (user_id, start_time, duration, session_type, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                db::format_ts(&start),
                new.duration,
                kind.as_str(),
                db::now_stamp(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        fetch_session(&self.conn, user_id, id, false)
    }

    pub fn get_session(&self, user_id: i64, id: i64) -> Result<Session> {
        fetch_session(&self.conn, user_id, id, false)
    }

    pub fn list_sessions(
        &self,
        user_id: i64,
        filter: &SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>> {
        let mut sql = format!(
            "SELECT {} FROM pomodoro_sessions WHERE user_id = ? AND deleted_at IS NULL",
            SESSION_COLS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(completed) = filter.completed {
            sql.push_str(" AND completed = ?");
            params_vec.push(Box::new(completed));
        }
        if let Some(kind) = filter.session_type {
            sql.push_str(" AND session_type = ?");
            params_vec.push(Box::new(kind.as_str()));
        }
        if let Some(after) = filter.started_after {
            sql.push_str(" AND start_time >= ?");
            params_vec.push(Box::new(db::format_ts(&after)));
        }
        if let Some(before) = filter.started_before {
            sql.push_str(" AND start_time <= ?");
            params_vec.push(Box::new(db::format_ts(&before)));
        }
        sql.push_str(" ORDER BY start_time DESC LIMIT ? OFFSET ?");
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let sessions = stmt
            .query_map(params_refs.as_slice(), db::session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Marks a session finished. `end_time` defaults to now and must fall
    /// strictly after the start; `actual_duration` defaults to the elapsed
    /// seconds.
    pub fn complete_session(
        &mut self,
        user_id: i64,
        id: i64,
        end_time: Option<chrono::DateTime<Utc>>,
        actual_duration: Option<i64>,
        interruption_reason: Option<String>,
    ) -> Result<Session> {
        let session = fetch_session(&self.conn, user_id, id, false)?;
        let end = end_time.unwrap_or_else(Utc::now);
        if end <= session.start_time {
            return Err(StoreError::InvalidAttribute {
                field: "end_time",
                value: end.to_rfc3339(),
            });
        }
        let actual = actual_duration
            .unwrap_or_else(|| end.signed_duration_since(session.start_time).num_seconds());

        self.conn.execute(
            "UPDATE pomodoro_sessions SET completed = 1, end_time = ?1, actual_duration = ?2, \
                 interruption_reason = COALESCE(?3, interruption_reason) \
             WHERE id = ?4",
            params![db::format_ts(&end), actual, interruption_reason, id],
        )?;
        fetch_session(&self.conn, user_id, id, false)
    }

    /// Adjusts the planned duration or interruption note of a live session.
    pub fn edit_session(
        &mut self,
        user_id: i64,
        id: i64,
        duration: Option<i64>,
        interruption_reason: Option<String>,
    ) -> Result<Session> {
        if let Some(d) = duration.filter(|d| *d <= 0) {
            return Err(StoreError::InvalidAttribute {
                field: "duration",
                value: d.to_string(),
            });
        }
        fetch_session(&self.conn, user_id, id, false)?;
        self.conn.execute(
            "UPDATE pomodoro_sessions SET duration = COALESCE(?1, duration), \
                 interruption_reason = COALESCE(?2, interruption_reason) \
             WHERE id = ?3",
            params![duration, interruption_reason, id],
        )?;
        fetch_session(&self.conn, user_id, id, false)
    }

    /// Soft-deletes a session along with its live task associations.
    pub fn delete_session(&mut self, user_id: i64, id: i64) -> Result<()> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let session = fetch_session(&tx, user_id, id, true)?;
        if session.deleted_at.is_some() {
            return Ok(());
        }
        let stamp = db::now_stamp();
        tx.execute(
            "UPDATE pomodoro_sessions SET deleted_at = ?1 WHERE id = ?2",
            params![stamp, id],
        )?;
        cascade::delete_session_links(&tx, id, &stamp)?;
        tx.commit()?;
        Ok(())
    }

    pub fn restore_session(&mut self, user_id: i64, id: i64) -> Result<Session> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let session = fetch_session(&tx, user_id, id, true)?;
        let Some(deleted_at) = session.deleted_at else {
            return Ok(session);
        };
        let stamp = db::format_ts(&deleted_at);
        tx.execute(
            "UPDATE pomodoro_sessions SET deleted_at = NULL WHERE id = ?1",
            [id],
        )?;
        cascade::restore_session_links(&tx, id, &stamp)?;
        tx.commit()?;
        fetch_session(&self.conn, user_id, id, false)
    }

    // ---- session/task associations ------------------------------------

    pub fn attach_task(
        &mut self,
        user_id: i64,
        session_id: i64,
        task_id: i64,
        time_spent: Option<i64>,
        notes: Option<String>,
    ) -> Result<TaskLink> {
        if let Some(t) = time_spent.filter(|t| *t < 0) {
            return Err(StoreError::InvalidAttribute {
                field: "time_spent",
                value: t.to_string(),
            });
        }
        fetch_session(&self.conn, user_id, session_id, false)?;
        require_owned_task(&self.conn, user_id, task_id)?;

        self.conn.execute(
            "INSERT INTO pomodoro_task_links (session_id, task_id, time_spent, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, task_id, time_spent, notes, db::now_stamp()],
        )?;
        let id = self.conn.last_insert_rowid();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pomodoro_task_links WHERE id = ?1",
            LINK_COLS
        ))?;
        Ok(stmt.query_row([id], db::link_from_row)?)
    }

    /// Soft-deletes the live association(s) between a session and a task.
    pub fn detach_task(&mut self, user_id: i64, session_id: i64, task_id: i64) -> Result<()> {
        fetch_session(&self.conn, user_id, session_id, false)?;
        let detached = self.conn.execute(
            "UPDATE pomodoro_task_links SET deleted_at = ?1 \
             WHERE session_id = ?2 AND task_id = ?3 AND deleted_at IS NULL",
            params![db::now_stamp(), session_id, task_id],
        )?;
        if detached == 0 {
            // The id names the task end: "link for task #N not found".
            return Err(StoreError::NotFound { what: "link for task", id: task_id });
        }
        Ok(())
    }

    pub fn tasks_for_session(&self, user_id: i64, session_id: i64) -> Result<Vec<TaskLink>> {
        fetch_session(&self.conn, user_id, session_id, false)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pomodoro_task_links \
             WHERE session_id = ?1 AND deleted_at IS NULL ORDER BY id",
            LINK_COLS
        ))?;
        let links = stmt
            .query_map([session_id], db::link_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn sessions_for_task(&self, user_id: i64, task_id: i64) -> Result<Vec<Session>> {
        fetch_task(&self.conn, user_id, task_id, false)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pomodoro_sessions \
             WHERE user_id = ?1 AND deleted_at IS NULL AND id IN ( \
                 SELECT session_id FROM pomodoro_task_links \
                 WHERE task_id = ?2 AND deleted_at IS NULL) \
             ORDER BY start_time DESC",
            SESSION_COLS
        ))?;
        let sessions = stmt
            .query_map(params![user_id, task_id], db::session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

// ---- shared row fetchers ----------------------------------------------

fn decode_path(encoded: &str) -> Result<TaskPath> {
    TaskPath::decode(encoded)
}

fn fetch_task(conn: &Connection, user_id: i64, id: i64, include_deleted: bool) -> Result<Task> {
    maybe_fetch(conn, user_id, id, include_deleted)?
        .ok_or(StoreError::NotFound { what: "task", id })
}

fn maybe_fetch_task(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Task>> {
    maybe_fetch(conn, user_id, id, false)
}

fn maybe_fetch(
    conn: &Connection,
    user_id: i64,
    id: i64,
    include_deleted: bool,
) -> Result<Option<Task>> {
    let sql = if include_deleted {
        format!("SELECT {} FROM tasks WHERE id = ?1 AND user_id = ?2", TASK_COLS)
    } else {
        format!(
            "SELECT {} FROM tasks WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
            TASK_COLS
        )
    };
    let task = conn
        .query_row(&sql, params![id, user_id], db::task_from_row)
        .optional()?;
    Ok(task)
}

/// Resolves a prospective parent: it must exist, be live, and belong to the
/// caller. Cross-owner parents are reported as such, not hidden behind
/// not-found, so the mistake is diagnosable.
fn require_parent(conn: &Connection, user_id: i64, parent_id: i64) -> Result<TaskPath> {
    let row: Option<(i64, String, Option<String>)> = conn
        .query_row(
            "SELECT user_id, path, deleted_at FROM tasks WHERE id = ?1",
            [parent_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    match row {
        None => Err(StoreError::NotFound { what: "parent task", id: parent_id }),
        Some((owner, _, _)) if owner != user_id => {
            Err(StoreError::CrossOwner { what: "parent task", id: parent_id })
        }
        Some((_, _, Some(_))) => {
            Err(StoreError::NotFound { what: "parent task", id: parent_id })
        }
        Some((_, path, None)) => decode_path(&path),
    }
}

/// Owner check for association endpoints: a task owned by someone else is a
/// cross-owner error rather than a generic not-found.
fn require_owned_task(conn: &Connection, user_id: i64, task_id: i64) -> Result<Task> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLS),
            [task_id],
            db::task_from_row,
        )
        .optional()?;
    match task {
        None => Err(StoreError::NotFound { what: "task", id: task_id }),
        Some(task) if task.user_id != user_id => {
            Err(StoreError::CrossOwner { what: "task", id: task_id })
        }
        Some(task) if task.deleted_at.is_some() => {
            Err(StoreError::NotFound { what: "task", id: task_id })
        }
        Some(task) => Ok(task),
    }
}

fn fetch_session(
    conn: &Connection,
    user_id: i64,
    id: i64,
    include_deleted: bool,
) -> Result<Session> {
    let row: Option<(i64, Session)> = conn
        .query_row(
            &format!("SELECT {} FROM pomodoro_sessions WHERE id = ?1", SESSION_COLS),
            [id],
            |row| Ok((row.get::<_, i64>(1)?, db::session_from_row(row)?)),
        )
        .optional()?;
    match row {
        None => Err(StoreError::NotFound { what: "session", id }),
        Some((owner, _)) if owner != user_id => {
            Err(StoreError::CrossOwner { what: "session", id })
        }
        Some((_, session)) if session.deleted_at.is_some() && !include_deleted => {
            Err(StoreError::NotFound { what: "session", id })
        }
        Some((_, session)) => Ok(session),
    }
}
