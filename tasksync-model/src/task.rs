//! Task model for `TaskSync`.
//!
//! A [`Task`] is always written as a whole record: every mutation produces a
//! new value that replaces the previous one in the snapshot. The
//! `completed` flag mirrors `status == Completed` and is kept in sync by the
//! mutating helpers on [`Task`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Identifier of a task, stable across devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh identifier. UUID v7, so ids sort by creation time.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID, e.g. one read back from storage.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Progress state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has not been started.
    NotStarted,
    /// Work has started.
    InProgress,
    /// Task has been completed.
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Error returned when parsing an unknown [`TaskStatus`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0} (expected not_started, in_progress or completed)")]
pub struct ParseStatusError(String);

impl std::str::FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_started" | "todo" => Ok(Self::NotStarted),
            "in_progress" | "doing" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A unit of work owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, assigned on creation.
    pub id: TaskId,
    /// Task title, never empty once saved.
    pub title: String,
    /// Free-form description, may be empty.
    pub description: String,
    /// Progress state.
    pub status: TaskStatus,
    /// Mirrors `status == TaskStatus::Completed`.
    pub completed: bool,
    /// When the task was assigned; equal to `created_at` for new tasks.
    pub assigned_date: DateTime<Utc>,
    /// Optional deadline.
    pub due_date: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Instant of the latest local mutation.
    pub updated_at: DateTime<Utc>,
    /// Identifier of the owning user.
    pub user_id: String,
    /// Monotonic per-task revision, bumped on every local mutation.
    pub revision: u64,
}

impl Task {
    /// Sets the status and keeps `completed` consistent with it.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed = status == TaskStatus::Completed;
    }

    /// Flips `completed`, moving the status between `NotStarted` and
    /// `Completed`.
    pub fn toggle_completed(&mut self) {
        if self.completed {
            self.set_status(TaskStatus::NotStarted);
        } else {
            self.set_status(TaskStatus::Completed);
        }
    }

    /// Records a local mutation at `now`: refreshes `updated_at` and bumps
    /// the revision.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.revision = self.revision.saturating_add(1);
    }

    /// Returns `true` if `completed` agrees with `status`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.completed == (self.status == TaskStatus::Completed)
    }
}
