use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(StoreError::InvalidAttribute {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Status::Pending),
            "in_progress" => Ok(Status::InProgress),
            "completed" => Ok(Status::Completed),
            "blocked" => Ok(Status::Blocked),
            other => Err(StoreError::InvalidAttribute {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Work => "work",
            SessionKind::ShortBreak => "short_break",
            SessionKind::LongBreak => "long_break",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "work" => Ok(SessionKind::Work),
            "short_break" => Ok(SessionKind::ShortBreak),
            "long_break" => Ok(SessionKind::LongBreak),
            other => Err(StoreError::InvalidAttribute {
                field: "session_type",
                value: other.to_string(),
            }),
        }
    }
}

/// A node in a per-owner task forest. `path` is derived from the ancestor
/// chain and is never accepted as caller input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Status,
    pub parent_id: Option<i64>,
    pub path: String,
    pub color_code: Option<String>,
    pub estimated_duration: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Caller-supplied attributes for task creation.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub parent_id: Option<i64>,
    pub color_code: Option<String>,
    pub estimated_duration: Option<i64>,
}

/// Partial non-structural edit. `Some` sets the field; reparenting goes
/// through `TaskStore::move_task`, never through here. Optional attributes
/// can be set but not cleared back to unset: a patch carries no
/// set-to-null form, so `description`, `color_code`, and
/// `estimated_duration` only ever move from unset to set or between
/// values.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub color_code: Option<String>,
    pub estimated_duration: Option<i64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.color_code.is_none()
            && self.estimated_duration.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Planned duration in seconds.
    pub duration: i64,
    /// Actual duration in seconds, filled on completion.
    pub actual_duration: Option<i64>,
    pub session_type: SessionKind,
    pub completed: bool,
    pub interruption_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub start_time: Option<DateTime<Utc>>,
    pub duration: i64,
    pub session_type: Option<SessionKind>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub completed: Option<bool>,
    pub session_type: Option<SessionKind>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
}

/// Join record linking a session to a task, soft-deletable independently
/// and cascaded from either parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLink {
    pub id: i64,
    pub session_id: i64,
    pub task_id: i64,
    /// Time spent on this task during the session, in seconds.
    pub time_spent: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Updated,
    SoftDeleted,
    Restored,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Updated => "updated",
            HistoryAction::SoftDeleted => "soft_deleted",
            HistoryAction::Restored => "restored",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "created" => Ok(HistoryAction::Created),
            "updated" => Ok(HistoryAction::Updated),
            "soft_deleted" => Ok(HistoryAction::SoftDeleted),
            "restored" => Ok(HistoryAction::Restored),
            other => Err(StoreError::InvalidAttribute {
                field: "action",
                value: other.to_string(),
            }),
        }
    }
}

/// One append-only audit record. Never updated or removed once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub action: HistoryAction,
    pub changes: crate::history::ChangeSet,
    pub timestamp: DateTime<Utc>,
}

/// Row shape shared by the breadcrumb and subtree queries. `level` is
/// relative to the query: depth-minus-one for breadcrumbs, depth below the
/// queried task for subtrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRow {
    pub id: i64,
    pub title: String,
    pub level: i64,
}
