//! Task operations for UI-facing code.
//!
//! [`TaskService`] owns the in-memory snapshot and is the only writer of the
//! durable task store. Every mutation is persisted locally first and then
//! handed to the outbox, so a change always "succeeds locally" even when the
//! backend is unreachable.

pub mod filter;
pub mod service;

pub use filter::{ParseSortKeyError, SortKey, TaskQuery, filter_tasks};
pub use service::{NewTask, ServiceSettings, TaskPatch, TaskService};

use thiserror::Error;

use tasksync_model::task::TaskId;

use crate::storage::StorageError;
use crate::sync::SyncError;

/// Failures of task service operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The title is blank after trimming.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// The title has more characters than allowed.
    #[error("task title too long (max {max} characters)")]
    TitleTooLong {
        /// Configured limit in characters.
        max: usize,
    },
    /// No task in the snapshot has this id.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// The snapshot could not be persisted; the operation did not happen.
    #[error("could not save tasks: {0}")]
    Storage(#[from] StorageError),
    /// An explicit sync request failed.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
}
