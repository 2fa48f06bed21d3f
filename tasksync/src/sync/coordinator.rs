//! Replay of the offline action log once connectivity returns.
//!
//! [`SyncCoordinator::reconcile`] forwards queued actions to the backend in
//! append order, folds each into the working snapshot, persists the result,
//! and only then removes the actions it processed. Anything not processed
//! stays queued for the next attempt, so delivery is at-least-once.
//!
//! [`SyncCoordinator::pull`] brings remote changes made on other devices
//! into the local snapshot using the revision merge in [`super::merge`].

use std::sync::Arc;

use chrono::Utc;

use tasksync_model::action::{ActionPayload, OfflineAction};
use tasksync_model::replay::{FoldOutcome, apply_action};
use tasksync_model::task::Task;

use super::SyncError;
use super::action_log::ActionLog;
use super::merge::merge_task_list;
use crate::backend::{Backend, BackendError, ListQuery, push_action};
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use crate::storage::KeyValueStore;
use crate::store::TaskStore;

/// What happened to the queued actions during one reconcile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Accepted by the backend and removed from the log.
    pub applied: usize,
    /// Refused by the backend for good (conflict, not found, rejected) and
    /// removed from the log.
    pub dropped: usize,
    /// Left in the log because the backend became unreachable.
    pub retained: usize,
}

impl ReconcileReport {
    /// Number of actions removed from the log.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.applied + self.dropped
    }
}

/// Result of a successful reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The folded, persisted snapshot.
    pub tasks: Vec<Task>,
    /// Per-action accounting.
    pub report: ReconcileReport,
}

/// Drives replay of the action log and remote pulls.
pub struct SyncCoordinator<K: KeyValueStore, B: Backend, P: ConnectivityProbe> {
    store: TaskStore<K>,
    log: ActionLog<K>,
    backend: Arc<B>,
    monitor: Arc<ConnectivityMonitor<P>>,
}

impl<K: KeyValueStore, B: Backend, P: ConnectivityProbe> SyncCoordinator<K, B, P> {
    /// Create a coordinator over the given collaborators.
    #[must_use]
    pub const fn new(
        store: TaskStore<K>,
        log: ActionLog<K>,
        backend: Arc<B>,
        monitor: Arc<ConnectivityMonitor<P>>,
    ) -> Self {
        Self {
            store,
            log,
            backend,
            monitor,
        }
    }

    /// Replay the action log on top of `current`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoConnection`] if the probe reports offline; nothing
    ///   is touched.
    /// - [`SyncError::Storage`] if `current` or the folded snapshot cannot be
    ///   persisted, or the log cannot be read. No action is removed from the
    ///   log in that case.
    pub async fn reconcile(&self, current: &[Task]) -> Result<Reconciliation, SyncError> {
        if !self.monitor.check_now().await.is_online() {
            return Err(SyncError::NoConnection);
        }

        self.store.replace_all(current).await?;
        let actions = self.log.list().await?;
        if actions.is_empty() {
            return Ok(Reconciliation {
                tasks: current.to_vec(),
                report: ReconcileReport::default(),
            });
        }
        tracing::info!(pending = actions.len(), "replaying offline actions");

        let mut tasks = current.to_vec();
        let mut processed = Vec::with_capacity(actions.len());
        let mut report = ReconcileReport::default();

        for (index, action) in actions.iter().enumerate() {
            match push_action(self.backend.as_ref(), action).await {
                Ok(()) => report.applied += 1,
                Err(err) if err.is_retryable() => {
                    report.retained = actions.len() - index;
                    tracing::warn!(
                        error = %err,
                        retained = report.retained,
                        "backend unreachable mid-replay, keeping remaining actions"
                    );
                    break;
                }
                Err(err) => {
                    log_dropped(action, &err);
                    report.dropped += 1;
                }
            }
            fold(&mut tasks, action);
            processed.push(action.id.clone());
        }

        self.store.replace_all(&tasks).await?;
        self.log.remove_many(&processed).await?;

        tracing::info!(
            applied = report.applied,
            dropped = report.dropped,
            retained = report.retained,
            tasks = tasks.len(),
            "reconcile finished"
        );
        Ok(Reconciliation { tasks, report })
    }

    /// Merge the backend's copy of `owner`'s tasks into `local` and persist
    /// the merged snapshot.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoConnection`] if the probe reports offline.
    /// - [`SyncError::Backend`] if the remote listing fails.
    /// - [`SyncError::Storage`] if the merged snapshot cannot be persisted.
    pub async fn pull(&self, local: &[Task], owner: &str) -> Result<Vec<Task>, SyncError> {
        if !self.monitor.check_now().await.is_online() {
            return Err(SyncError::NoConnection);
        }

        let docs = self.backend.list_tasks(&ListQuery::for_owner(owner)).await?;
        let now = Utc::now();
        let latest_write = docs.iter().map(|d| d.written_at.resolve(now)).max();

        let mut tasks = local.to_vec();
        let summary = merge_task_list(&mut tasks, &docs);
        if !summary.is_noop() {
            self.store.replace_all(&tasks).await?;
        }
        tracing::info!(
            remote = docs.len(),
            added = summary.added,
            replaced = summary.replaced,
            removed = summary.removed,
            latest_write = ?latest_write,
            "pulled remote tasks"
        );
        Ok(tasks)
    }
}

/// Folds `action` unless it would overwrite a newer local copy of the task.
///
/// An action sent directly while older ones were still queued leaves the
/// snapshot ahead of the log; replaying the older payload must not roll the
/// task back.
fn fold(tasks: &mut Vec<Task>, action: &OfflineAction) -> FoldOutcome {
    if let ActionPayload::Create(incoming) | ActionPayload::Update(incoming) = &action.payload {
        let newer_local = tasks
            .iter()
            .any(|t| t.id == incoming.id && t.revision > incoming.revision);
        if newer_local {
            tracing::debug!(task_id = %incoming.id, "skipping stale replay");
            return FoldOutcome::Skipped;
        }
    }
    apply_action(tasks, action)
}

fn log_dropped(action: &OfflineAction, err: &BackendError) {
    tracing::warn!(
        action_id = %action.id,
        kind = %action.kind(),
        task_id = %action.task_id(),
        error = %err,
        "backend refused queued action, dropping it"
    );
}
