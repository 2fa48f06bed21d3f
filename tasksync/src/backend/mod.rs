//! Remote document store abstraction.
//!
//! Defines the [`Backend`] trait that the outbox and the sync coordinator
//! talk to. Concrete implementations:
//! - [`memory::MemoryBackend`]: in-process document map for tests, with an
//!   availability switch and optional soft delete
//! - [`file::FileBackend`]: one JSON document per task in a shared directory
//!
//! Writes carry the task's `revision`; a backend refuses a write whose
//! revision is older than the one it already holds.

pub mod file;
pub mod memory;

use tasksync_model::action::{ActionPayload, OfflineAction};
use tasksync_model::document::TaskDocument;
use tasksync_model::task::{Task, TaskId};

/// Errors that can occur when talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The addressed document does not exist.
    #[error("document not found: {0}")]
    NotFound(TaskId),

    /// The backend holds a newer revision of the document.
    #[error("revision conflict on {id}: remote has {remote}, write carried {local}")]
    Conflict {
        /// Document identifier.
        id: TaskId,
        /// Revision stored remotely.
        remote: u64,
        /// Revision carried by the rejected write.
        local: u64,
    },

    /// The backend refused the write for another reason.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Returns `true` if the failure is about reachability and the write
    /// should be retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Ordering for [`Backend::list_tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    /// Backend's natural order.
    #[default]
    Unordered,
    /// Oldest creation first.
    CreatedAt,
    /// Earliest assigned date first.
    AssignedDate,
}

/// Filter for [`Backend::list_tasks`].
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Only documents owned by this user.
    pub owner: Option<String>,
    /// Include soft-deleted tombstones.
    pub include_deleted: bool,
    /// Result ordering.
    pub order: ListOrder,
}

impl ListQuery {
    /// Query for every document owned by `user_id`, tombstones included.
    pub fn for_owner(user_id: impl Into<String>) -> Self {
        Self {
            owner: Some(user_id.into()),
            include_deleted: true,
            order: ListOrder::CreatedAt,
        }
    }

    /// Returns `true` if `doc` passes the filter.
    #[must_use]
    pub fn matches(&self, doc: &TaskDocument) -> bool {
        if doc.deleted && !self.include_deleted {
            return false;
        }
        self.owner
            .as_ref()
            .is_none_or(|owner| &doc.task.user_id == owner)
    }

    /// Sorts `docs` according to [`ListQuery::order`].
    pub fn sort(&self, docs: &mut [TaskDocument]) {
        match self.order {
            ListOrder::Unordered => {}
            ListOrder::CreatedAt => docs.sort_by_key(|d| d.task.created_at),
            ListOrder::AssignedDate => docs.sort_by_key(|d| d.task.assigned_date),
        }
    }
}

/// Async document store holding the cross-device task collection.
pub trait Backend: Send + Sync {
    /// Store a new task document. Re-creating an existing id with the same
    /// or a newer revision overwrites it.
    fn create_task(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<TaskId, BackendError>> + Send;

    /// Replace an existing task document.
    fn update_task(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;

    /// Fetch one document, tombstones included.
    fn get_task(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<Option<TaskDocument>, BackendError>> + Send;

    /// List documents matching `query`.
    fn list_tasks(
        &self,
        query: &ListQuery,
    ) -> impl std::future::Future<Output = Result<Vec<TaskDocument>, BackendError>> + Send;

    /// Delete a document (hard or soft, per implementation). Deleting an
    /// unknown id is [`BackendError::NotFound`].
    fn delete_task(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;
}

/// Forward one offline action to `backend`.
///
/// # Errors
///
/// Returns whatever [`BackendError`] the matching backend call produced.
pub async fn push_action<B: Backend>(backend: &B, action: &OfflineAction) -> Result<(), BackendError> {
    match &action.payload {
        ActionPayload::Create(task) => backend.create_task(task).await.map(|_| ()),
        ActionPayload::Update(task) => backend.update_task(task).await,
        ActionPayload::Delete(id) => backend.delete_task(id).await,
    }
}

/// Checks an incoming write against the stored revision.
pub(crate) fn check_revision(stored: Option<&TaskDocument>, incoming: &Task) -> Result<(), BackendError> {
    match stored {
        Some(doc) if doc.task.revision > incoming.revision => Err(BackendError::Conflict {
            id: incoming.id.clone(),
            remote: doc.task.revision,
            local: incoming.revision,
        }),
        _ => Ok(()),
    }
}
