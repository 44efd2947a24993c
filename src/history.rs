use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{HistoryAction, Priority, Status, Task};

/// One tracked attribute value inside a history diff. Variant order matters
/// for untagged deserialization: timestamps must be tried before plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Int(i64),
    Time(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    pub fn text(value: Option<&str>) -> Self {
        match value {
            Some(s) => FieldValue::Text(s.to_string()),
            None => FieldValue::Null,
        }
    }

    pub fn int(value: Option<i64>) -> Self {
        match value {
            Some(n) => FieldValue::Int(n),
            None => FieldValue::Null,
        }
    }

    pub fn time(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(ts) => FieldValue::Time(ts),
            None => FieldValue::Null,
        }
    }

    pub fn priority(value: Option<Priority>) -> Self {
        FieldValue::text(value.map(|p| p.as_str()))
    }

    pub fn status(value: Status) -> Self {
        FieldValue::Text(value.as_str().to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("(none)"),
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::Time(ts) => write!(f, "{}", ts.to_rfc3339()),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Structured diff of one mutation: tracked attribute name to {old, new}.
/// BTreeMap keeps serialized output stable for tests and for readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet(BTreeMap::new())
    }

    /// Records a change, suppressing no-op pairs so an untouched field never
    /// produces a diff key.
    pub fn push(&mut self, field: &str, old: FieldValue, new: FieldValue) {
        if old != new {
            self.0.insert(field.to_string(), FieldChange { old, new });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.0.iter()
    }
}

/// Attribute-by-attribute diff of two task snapshots. The auto-maintained
/// `updated_at` (and immutable `created_at`) are excluded so every touch
/// does not produce a noise entry.
pub fn diff(before: &Task, after: &Task) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.push(
        "title",
        FieldValue::text(Some(&before.title)),
        FieldValue::text(Some(&after.title)),
    );
    changes.push(
        "description",
        FieldValue::text(before.description.as_deref()),
        FieldValue::text(after.description.as_deref()),
    );
    changes.push(
        "priority",
        FieldValue::priority(before.priority),
        FieldValue::priority(after.priority),
    );
    changes.push(
        "status",
        FieldValue::status(before.status),
        FieldValue::status(after.status),
    );
    changes.push(
        "parent_id",
        FieldValue::int(before.parent_id),
        FieldValue::int(after.parent_id),
    );
    changes.push(
        "path",
        FieldValue::text(Some(&before.path)),
        FieldValue::text(Some(&after.path)),
    );
    changes.push(
        "color_code",
        FieldValue::text(before.color_code.as_deref()),
        FieldValue::text(after.color_code.as_deref()),
    );
    changes.push(
        "estimated_duration",
        FieldValue::int(before.estimated_duration),
        FieldValue::int(after.estimated_duration),
    );
    changes.push(
        "completed_at",
        FieldValue::time(before.completed_at),
        FieldValue::time(after.completed_at),
    );
    changes.push(
        "deleted_at",
        FieldValue::time(before.deleted_at),
        FieldValue::time(after.deleted_at),
    );
    changes
}

/// Diff for a freshly created task: every caller-visible attribute against
/// null. Unset optional fields are suppressed by the no-op rule.
pub fn creation_changes(task: &Task) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.push("title", FieldValue::Null, FieldValue::text(Some(&task.title)));
    changes.push(
        "description",
        FieldValue::Null,
        FieldValue::text(task.description.as_deref()),
    );
    changes.push("priority", FieldValue::Null, FieldValue::priority(task.priority));
    changes.push("status", FieldValue::Null, FieldValue::status(task.status));
    changes.push("parent_id", FieldValue::Null, FieldValue::int(task.parent_id));
    changes.push("path", FieldValue::Null, FieldValue::text(Some(&task.path)));
    changes.push(
        "color_code",
        FieldValue::Null,
        FieldValue::text(task.color_code.as_deref()),
    );
    changes.push(
        "estimated_duration",
        FieldValue::Null,
        FieldValue::int(task.estimated_duration),
    );
    changes
}

/// Classifies a mutation for the audit log. Deletion-marker transitions take
/// precedence over any other attribute change.
pub fn classify(before: Option<&Task>, after: &Task) -> HistoryAction {
    let Some(before) = before else {
        return HistoryAction::Created;
    };
    match (&before.deleted_at, &after.deleted_at) {
        (None, Some(_)) => HistoryAction::SoftDeleted,
        (Some(_), None) => HistoryAction::Restored,
        _ => HistoryAction::Updated,
    }
}

/// Appends one audit entry. An empty diff writes nothing; a failed insert
/// propagates and aborts the enclosing transaction, the log is never
/// best-effort.
pub fn record(
    conn: &Connection,
    task_id: i64,
    user_id: i64,
    action: HistoryAction,
    changes: &ChangeSet,
) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }
    debug!(task_id, action = action.as_str(), fields = changes.len(), "recording history");
    conn.execute(
        "INSERT INTO task_history (task_id, user_id, action, changes, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            task_id,
            user_id,
            action.as_str(),
            serde_json::to_string(changes)?,
            crate::db::now_stamp(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task() -> Task {
        let ts = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        Task {
            id: 1,
            user_id: 1,
            title: "Write report".to_string(),
            description: None,
            priority: Some(Priority::Medium),
            status: Status::Pending,
            parent_id: None,
            path: "1".to_string(),
            color_code: None,
            estimated_duration: Some(1800),
            created_at: ts,
            updated_at: ts,
            completed_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let task = sample_task();
        assert!(diff(&task, &task).is_empty());
    }

    #[test]
    fn test_diff_ignores_updated_at() {
        let before = sample_task();
        let mut after = before.clone();
        after.updated_at = Utc::now();
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn test_diff_captures_old_and_new() {
        let before = sample_task();
        let mut after = before.clone();
        after.title = "Submit report".to_string();
        after.priority = Some(Priority::High);

        let changes = diff(&before, &after);
        assert_eq!(changes.len(), 2);
        let title = changes.get("title").unwrap();
        assert_eq!(title.old, FieldValue::Text("Write report".to_string()));
        assert_eq!(title.new, FieldValue::Text("Submit report".to_string()));
        assert_eq!(
            changes.get("priority").unwrap().new,
            FieldValue::Text("high".to_string())
        );
    }

    #[test]
    fn test_creation_changes_skip_unset_fields() {
        let task = sample_task();
        let changes = creation_changes(&task);
        assert!(changes.get("title").is_some());
        assert!(changes.get("status").is_some());
        assert!(changes.get("estimated_duration").is_some());
        // description and parent_id are unset, so null -> null is suppressed
        assert!(changes.get("description").is_none());
        assert!(changes.get("parent_id").is_none());
    }

    #[test]
    fn test_classify_created() {
        let task = sample_task();
        assert_eq!(classify(None, &task), HistoryAction::Created);
    }

    #[test]
    fn test_classify_deletion_transitions_win() {
        let before = sample_task();
        let mut after = before.clone();
        after.deleted_at = Some(Utc::now());
        // A title edit in the same mutation does not demote the action.
        after.title = "Renamed".to_string();
        assert_eq!(classify(Some(&before), &after), HistoryAction::SoftDeleted);

        assert_eq!(classify(Some(&after), &before), HistoryAction::Restored);
        assert_eq!(classify(Some(&before), &before), HistoryAction::Updated);
    }

    #[test]
    fn test_change_set_json_round_trip() {
        let before = sample_task();
        let mut after = before.clone();
        after.status = Status::Completed;
        after.completed_at = Some(Utc.with_ymd_and_hms(2026, 1, 11, 12, 30, 0).unwrap());

        let changes = diff(&before, &after);
        let json = serde_json::to_string(&changes).unwrap();
        let parsed: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, changes);
        // completed_at must come back as a timestamp, not plain text
        assert!(matches!(
            parsed.get("completed_at").unwrap().new,
            FieldValue::Time(_)
        ));
    }

    #[test]
    fn test_push_suppresses_no_op() {
        let mut changes = ChangeSet::new();
        changes.push("title", FieldValue::text(Some("a")), FieldValue::text(Some("a")));
        assert!(changes.is_empty());
    }
}
