//! Backend-side representation of a task.
//!
//! Document stores hand back a server-assigned write time that may still be
//! a pending sentinel when the write has not been committed yet. Callers
//! must resolve it before treating it as an instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Server-assigned timestamp, possibly not yet resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerTimestamp {
    /// The server has not assigned a time yet.
    Pending,
    /// Concrete commit instant.
    At(DateTime<Utc>),
}

impl ServerTimestamp {
    /// Returns the concrete instant, substituting `fallback` for a pending
    /// sentinel.
    #[must_use]
    pub const fn resolve(self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Pending => fallback,
            Self::At(at) => at,
        }
    }

    /// Returns `true` while the server has not assigned a time.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A task as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Latest task record.
    pub task: Task,
    /// Soft-delete tombstone marker.
    pub deleted: bool,
    /// Server write time of the latest change.
    pub written_at: ServerTimestamp,
}

impl TaskDocument {
    /// Wraps a live task with a pending write time.
    #[must_use]
    pub const fn pending(task: Task) -> Self {
        Self {
            task,
            deleted: false,
            written_at: ServerTimestamp::Pending,
        }
    }
}
