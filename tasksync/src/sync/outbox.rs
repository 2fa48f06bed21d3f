//! Send-now-or-queue dispatch of task mutations.
//!
//! [`Outbox`] is the single place that decides where a mutation goes. When
//! the connectivity probe reports online it forwards the action to the
//! [`Backend`]; when the device is offline, or the backend call fails, the
//! action is appended to the [`ActionLog`] for the next reconcile. A failure
//! to queue is logged and reported as [`Delivery::Lost`], never as an error:
//! the local snapshot is already persisted by the time the outbox runs.

use std::fmt;
use std::sync::Arc;

use tasksync_model::action::OfflineAction;

use super::action_log::ActionLog;
use crate::backend::{Backend, push_action};
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use crate::storage::KeyValueStore;

/// Where a submitted action ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the backend.
    Sent,
    /// Appended to the offline action log.
    Queued,
    /// Neither sent nor queued; the failure was logged.
    Lost,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Queued => write!(f, "queued"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// Dispatches actions to the backend, falling back to the action log.
pub struct Outbox<K: KeyValueStore, B: Backend, P: ConnectivityProbe> {
    backend: Arc<B>,
    log: ActionLog<K>,
    monitor: Arc<ConnectivityMonitor<P>>,
}

impl<K: KeyValueStore, B: Backend, P: ConnectivityProbe> Clone for Outbox<K, B, P> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            log: self.log.clone(),
            monitor: Arc::clone(&self.monitor),
        }
    }
}

impl<K: KeyValueStore, B: Backend, P: ConnectivityProbe> Outbox<K, B, P> {
    /// Create an outbox over `backend`, queuing into `log`.
    #[must_use]
    pub const fn new(backend: Arc<B>, log: ActionLog<K>, monitor: Arc<ConnectivityMonitor<P>>) -> Self {
        Self {
            backend,
            log,
            monitor,
        }
    }

    /// The action log this outbox queues into.
    #[must_use]
    pub const fn log(&self) -> &ActionLog<K> {
        &self.log
    }

    /// Deliver `action` to the backend or queue it.
    pub async fn submit(&self, action: OfflineAction) -> Delivery {
        let kind = action.kind();
        let task_id = action.task_id().clone();

        if self.monitor.check_now().await.is_online() {
            match push_action(self.backend.as_ref(), &action).await {
                Ok(()) => {
                    tracing::debug!(%kind, %task_id, "action sent to backend");
                    return Delivery::Sent;
                }
                Err(err) => {
                    tracing::warn!(
                        %kind,
                        %task_id,
                        error = %err,
                        "backend write failed, queuing action for later"
                    );
                }
            }
        } else {
            tracing::debug!(%kind, %task_id, "offline, queuing action");
        }

        match self.log.append(action).await {
            Ok(_) => Delivery::Queued,
            Err(err) => {
                tracing::error!(
                    %kind,
                    %task_id,
                    error = %err,
                    "failed to queue offline action, change will not reach the backend"
                );
                Delivery::Lost
            }
        }
    }
}
