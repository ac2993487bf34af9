//! Task model shared by the `TaskFlow` client and sync server.
//!
//! A [`Task`] is one entry in the user's list. Its [`TaskId`] is assigned by
//! whichever backend created the record: the sync server stamps appended
//! documents, and the client generates ids itself when it is operating
//! against its local snapshot. Ids from the two backends are never
//! reconciled into one id space.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed task text length in characters.
pub const MAX_TASK_TEXT_LENGTH: usize = 1024;

/// Opaque unique identifier for a task.
///
/// Stored and transmitted as a string. Freshly generated ids are UUID v7,
/// so locally created tasks carry a time-ordered id, but nothing may assume
/// that shape: ids arriving from the sync server are treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an existing backend-assigned identifier.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single entry in the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned by the backend that created the record.
    pub id: TaskId,
    /// User-entered content. Non-blank at creation; otherwise unrestricted.
    pub text: String,
    /// Whether the task has been completed.
    pub completed: bool,
    /// Server creation timestamp in milliseconds since epoch.
    ///
    /// `Some` only for tasks sourced from the sync server, where it drives
    /// the newest-first ordering. Tasks created against the local snapshot
    /// have no timestamp and keep their insertion order.
    pub created_at: Option<u64>,
}

impl Task {
    /// Returns true if this task should be visible for the given
    /// completion-state selection.
    #[must_use]
    pub const fn matches_completed(&self, completed: bool) -> bool {
        self.completed == completed
    }
}
