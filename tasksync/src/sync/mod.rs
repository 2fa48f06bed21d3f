//! Offline queueing and reconciliation.
//!
//! - [`action_log::ActionLog`] durably queues mutations that could not reach
//!   the backend.
//! - [`outbox::Outbox`] decides, per mutation, whether it goes to the backend
//!   now or into the log.
//! - [`coordinator::SyncCoordinator`] replays the log once connectivity is
//!   back and pulls remote changes.
//! - [`merge`] holds the pure revision-based merge used by pull.

pub mod action_log;
pub mod coordinator;
pub mod merge;
pub mod outbox;

pub use action_log::ActionLog;
pub use coordinator::{ReconcileReport, Reconciliation, SyncCoordinator};
pub use merge::{MergeSummary, merge_task_list, remote_wins};
pub use outbox::{Delivery, Outbox};

use thiserror::Error;

use crate::backend::BackendError;
use crate::storage::StorageError;

/// Errors that can occur while synchronizing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The device is offline; nothing was attempted.
    #[error("no network connection")]
    NoConnection,

    /// Local persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The backend refused a read needed to finish the sync.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
