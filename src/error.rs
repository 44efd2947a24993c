use thiserror::Error;

/// Typed failures surfaced by the task store. The CLI (and any other
/// front-end) maps these to user-facing messages; the store itself never
/// swallows a structural inconsistency.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record missing, soft-deleted, or not owned by the caller.
    #[error("{what} #{id} not found")]
    NotFound { what: &'static str, id: i64 },

    /// Reparenting would make a task its own ancestor.
    #[error("moving task #{task_id} under #{parent_id} would create a cycle")]
    Cycle { task_id: i64, parent_id: i64 },

    /// Parent, child, or association ends belong to different owners.
    #[error("{what} #{id} belongs to another user")]
    CrossOwner { what: &'static str, id: i64 },

    /// Malformed status, priority, duration, or similar caller input.
    #[error("invalid {field}: {value:?}")]
    InvalidAttribute { field: &'static str, value: String },

    /// A conflicting structural mutation is in flight; the caller may retry.
    #[error("concurrent modification, retry the operation")]
    ConcurrentModification,

    /// Materialized path corruption. Indicates a bug, not a user error.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    /// History payload failed to (de)serialize.
    #[error("history serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // A lock that outlives the busy timeout means a structural write is
        // racing ours; surface it as a retryable conflict.
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return StoreError::ConcurrentModification;
            }
        }
        StoreError::Sqlite(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_concurrent_modification() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(
            StoreError::from(busy),
            StoreError::ConcurrentModification
        ));
    }

    #[test]
    fn test_other_sqlite_errors_pass_through() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn test_display_messages() {
        let err = StoreError::NotFound { what: "task", id: 7 };
        assert_eq!(err.to_string(), "task #7 not found");

        let err = StoreError::Cycle { task_id: 1, parent_id: 2 };
        assert!(err.to_string().contains("cycle"));
    }
}
