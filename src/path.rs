use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Materialized path of a task: the ancestor identifiers from root to the
/// task itself, e.g. `1.2.3` for a grandchild. Ordering and prefix tests are
/// segment-wise over the integers, never lexical over the text form, so
/// `2.x` sorts before `10.x` and `1` is not treated as a prefix of `10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskPath(Vec<i64>);

impl TaskPath {
    pub fn root(id: i64) -> Self {
        TaskPath(vec![id])
    }

    /// Path of a child of `self`.
    pub fn child(&self, id: i64) -> Self {
        let mut segments = self.0.clone();
        segments.push(id);
        TaskPath(segments)
    }

    pub fn decode(encoded: &str) -> Result<Self, StoreError> {
        if encoded.is_empty() {
            return Err(StoreError::InvalidPath {
                path: encoded.to_string(),
                reason: "empty chain",
            });
        }
        let segments = encoded
            .split('.')
            .map(|seg| {
                seg.parse::<i64>().map_err(|_| StoreError::InvalidPath {
                    path: encoded.to_string(),
                    reason: "non-numeric segment",
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaskPath(segments))
    }

    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn segments(&self) -> &[i64] {
        &self.0
    }

    /// Root is depth 1.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Identifier of the task the path addresses (the last segment).
    pub fn leaf(&self) -> i64 {
        *self.0.last().expect("path is never empty")
    }

    /// True iff `self` is an ancestor-or-self path of `other`.
    pub fn is_prefix_of(&self, other: &TaskPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Rewrites `self` by swapping the `old` prefix for `new`, preserving the
    /// relative suffix. Returns `None` when `old` is not actually a prefix.
    pub fn replace_prefix(&self, old: &TaskPath, new: &TaskPath) -> Option<TaskPath> {
        if !old.is_prefix_of(self) {
            return None;
        }
        let mut segments = new.0.clone();
        segments.extend_from_slice(&self.0[old.0.len()..]);
        Some(TaskPath(segments))
    }

    /// SQL LIKE pattern matching strict descendants of this path. Safe
    /// because segments are numeric: the text form never contains `%` or `_`,
    /// and the trailing dot keeps `1` from matching under `10`.
    pub fn descendants_pattern(&self) -> String {
        format!("{}.%", self.encode())
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<TaskPath> for String {
    fn from(path: TaskPath) -> String {
        path.encode()
    }
}

impl TryFrom<String> for TaskPath {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, StoreError> {
        TaskPath::decode(&s)
    }
}
