//! Offline actions: mutations recorded while the backend was unreachable.
//!
//! The payload enum doubles as the action kind, so a `DELETE` can never carry
//! a full task and a `CREATE` can never carry a bare identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{Task, TaskId};

/// Unique identifier for an offline action (UUID v7, time-ordered).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(Uuid);

impl ActionId {
    /// Creates a new time-ordered action identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an `ActionId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three kinds of queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A task was created.
    Create,
    /// A task was replaced with a new version.
    Update,
    /// A task was removed.
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Kind-specific payload of an [`OfflineAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPayload {
    /// Full task as created locally.
    Create(Task),
    /// Full replacement record for an existing task.
    Update(Task),
    /// Identifier of the removed task.
    Delete(TaskId),
}

/// A mutation awaiting confirmation against the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineAction {
    /// Unique action identifier.
    pub id: ActionId,
    /// What happened, with its data.
    pub payload: ActionPayload,
    /// When the action was recorded.
    pub created_at: DateTime<Utc>,
}

impl OfflineAction {
    /// Records a creation of `task`.
    #[must_use]
    pub fn create(task: Task) -> Self {
        Self::with_payload(ActionPayload::Create(task))
    }

    /// Records a full-record update to `task`.
    #[must_use]
    pub fn update(task: Task) -> Self {
        Self::with_payload(ActionPayload::Update(task))
    }

    /// Records the removal of the task with `task_id`.
    #[must_use]
    pub fn delete(task_id: TaskId) -> Self {
        Self::with_payload(ActionPayload::Delete(task_id))
    }

    fn with_payload(payload: ActionPayload) -> Self {
        Self {
            id: ActionId::new(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Returns the kind of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self.payload {
            ActionPayload::Create(_) => ActionKind::Create,
            ActionPayload::Update(_) => ActionKind::Update,
            ActionPayload::Delete(_) => ActionKind::Delete,
        }
    }

    /// Returns the identifier of the task this action targets.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match &self.payload {
            ActionPayload::Create(task) | ActionPayload::Update(task) => &task.id,
            ActionPayload::Delete(id) => id,
        }
    }
}
