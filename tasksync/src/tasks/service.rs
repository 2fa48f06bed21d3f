//! Task service: the single writer of the task snapshot.
//!
//! `TaskService` validates input, applies the change to a copy of the
//! in-memory snapshot, persists that copy, adopts it, and then hands the
//! matching offline action to the [`Outbox`]. The snapshot lives behind one
//! async mutex held across the whole sequence, so mutations and syncs never
//! interleave.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, broadcast};

use tasksync_model::action::OfflineAction;
use tasksync_model::codec::BlobFormat;
use tasksync_model::task::{MAX_TASK_TITLE_LENGTH, Task, TaskId, TaskStatus};

use super::TaskError;
use super::filter::{TaskQuery, filter_tasks};
use crate::backend::Backend;
use crate::connectivity::{Connectivity, ConnectivityMonitor, ConnectivityProbe};
use crate::storage::KeyValueStore;
use crate::store::TaskStore;
use crate::sync::{ActionLog, Outbox, ReconcileReport, SyncCoordinator};

/// Input for [`TaskService::create_task`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    /// Title; surrounding whitespace is trimmed.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Optional deadline.
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    /// A task with only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update for [`TaskService::update_task`]. `None` leaves a field
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title; validated like a new task's title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status; `completed` follows it.
    pub status: Option<TaskStatus>,
    /// New due date; `Some(None)` clears it.
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.set_status(status);
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}

/// Settings for a [`TaskService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Owner recorded on new tasks and used for pulls.
    pub user_id: String,
    /// Encoding of the persisted blobs.
    pub format: BlobFormat,
    /// Longest accepted title, in characters.
    pub max_title_len: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            format: BlobFormat::default(),
            max_title_len: MAX_TASK_TITLE_LENGTH,
        }
    }
}

/// Facade over local storage, the outbox and the sync coordinator.
pub struct TaskService<K: KeyValueStore, B: Backend, P: ConnectivityProbe> {
    /// The authoritative in-memory snapshot. Held for the full duration of
    /// every mutation and sync.
    tasks: Mutex<Vec<Task>>,
    store: TaskStore<K>,
    outbox: Outbox<K, B, P>,
    coordinator: SyncCoordinator<K, B, P>,
    monitor: Arc<ConnectivityMonitor<P>>,
    user_id: String,
    max_title_len: usize,
}

impl<K: KeyValueStore, B: Backend, P: ConnectivityProbe> TaskService<K, B, P> {
    /// Build a service and load the persisted snapshot from `kv`.
    ///
    /// An unreadable snapshot starts the service empty (see
    /// [`TaskStore::get_all`]).
    pub async fn open(
        kv: Arc<K>,
        backend: Arc<B>,
        monitor: Arc<ConnectivityMonitor<P>>,
        settings: ServiceSettings,
    ) -> Self {
        let store = TaskStore::new(Arc::clone(&kv), settings.format);
        let log = ActionLog::new(kv, settings.format);
        let outbox = Outbox::new(Arc::clone(&backend), log.clone(), Arc::clone(&monitor));
        let coordinator = SyncCoordinator::new(store.clone(), log, backend, Arc::clone(&monitor));
        let tasks = store.get_all().await;
        tracing::debug!(count = tasks.len(), user_id = %settings.user_id, "task snapshot loaded");

        Self {
            tasks: Mutex::new(tasks),
            store,
            outbox,
            coordinator,
            monitor,
            user_id: settings.user_id,
            max_title_len: settings.max_title_len,
        }
    }

    /// Owner of tasks created through this service.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The connectivity monitor shared with the outbox.
    #[must_use]
    pub const fn monitor(&self) -> &Arc<ConnectivityMonitor<P>> {
        &self.monitor
    }

    /// Creates a task owned by this service's user.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TitleEmpty`] or [`TaskError::TitleTooLong`] for a
    /// bad title, or [`TaskError::Storage`] if the snapshot cannot be saved.
    pub async fn create_task(&self, new: NewTask) -> Result<Task, TaskError> {
        let title = self.validate_title(&new.title)?;

        let mut tasks = self.tasks.lock().await;
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            title,
            description: new.description,
            status: TaskStatus::NotStarted,
            completed: false,
            assigned_date: now,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
            user_id: self.user_id.clone(),
            revision: 1,
        };

        let mut next = tasks.clone();
        next.push(task.clone());
        self.store.replace_all(&next).await?;
        *tasks = next;

        let delivery = self.outbox.submit(OfflineAction::create(task.clone())).await;
        tracing::info!(task_id = %task.id, %delivery, "task created");
        Ok(task)
    }

    /// Applies `patch` to the task with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] for an unknown id (nothing is
    /// written), a title validation error, or [`TaskError::Storage`].
    pub async fn update_task(&self, id: &TaskId, mut patch: TaskPatch) -> Result<Task, TaskError> {
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(self.validate_title(title)?);
        }
        self.mutate(id, "task updated", |task| patch.apply(task)).await
    }

    /// Flips the completion flag of the task with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] or [`TaskError::Storage`].
    pub async fn toggle_task_complete(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.mutate(id, "task completion toggled", Task::toggle_completed)
            .await
    }

    /// Sets the status of the task with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] or [`TaskError::Storage`].
    pub async fn change_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, TaskError> {
        self.mutate(id, "task status changed", |task| task.set_status(status))
            .await
    }

    /// Removes the task with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::TaskNotFound`] or [`TaskError::Storage`].
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock().await;
        let index = Self::position(&tasks, id)?;

        let mut next = tasks.clone();
        next.remove(index);
        self.store.replace_all(&next).await?;
        *tasks = next;

        let delivery = self.outbox.submit(OfflineAction::delete(id.clone())).await;
        tracing::info!(task_id = %id, %delivery, "task deleted");
        Ok(())
    }

    /// Snapshot of every task.
    pub async fn list_tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    /// The task with `id`, if present.
    pub async fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().await.iter().find(|t| &t.id == id).cloned()
    }

    /// Tasks matching `query`; see [`filter_tasks`].
    pub async fn filter_tasks(&self, query: &TaskQuery) -> Vec<Task> {
        filter_tasks(&self.tasks.lock().await, query)
    }

    /// Actions waiting in the offline log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Storage`] if the log cannot be read.
    pub async fn pending_actions(&self) -> Result<Vec<OfflineAction>, TaskError> {
        Ok(self.outbox.log().list().await?)
    }

    /// Replays the offline log and adopts the reconciled snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Sync`] when offline or when persistence fails;
    /// the in-memory snapshot is left unchanged in that case.
    pub async fn sync(&self) -> Result<ReconcileReport, TaskError> {
        let mut tasks = self.tasks.lock().await;
        let reconciled = self.coordinator.reconcile(&tasks).await?;
        *tasks = reconciled.tasks;
        Ok(reconciled.report)
    }

    /// [`sync`](Self::sync), then pulls remote changes for this user.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Sync`] if either step fails. A failed pull keeps
    /// the reconciled snapshot.
    pub async fn refresh(&self) -> Result<ReconcileReport, TaskError> {
        let mut tasks = self.tasks.lock().await;
        let reconciled = self.coordinator.reconcile(&tasks).await?;
        *tasks = reconciled.tasks;
        let pulled = self.coordinator.pull(&tasks, &self.user_id).await?;
        *tasks = pulled;
        Ok(reconciled.report)
    }

    /// Spawn a background task that syncs once if the device is online when
    /// it starts, then on every transition to online.
    ///
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn_auto_sync(self: &Arc<Self>) -> tokio::task::JoinHandle<()>
    where
        K: 'static,
        B: 'static,
        P: 'static,
    {
        // Subscribe before probing so no transition in between is missed.
        let mut events = self.monitor.events();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if service.monitor.check_now().await.is_online() {
                service.auto_sync().await;
            }
            loop {
                match events.recv().await {
                    Ok(Connectivity::Online) => service.auto_sync().await,
                    Ok(Connectivity::Offline) => {
                        tracing::debug!("went offline, mutations will be queued");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "auto-sync lagged behind connectivity events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn auto_sync(&self) {
        match self.sync().await {
            Ok(report) if report.processed() == 0 && report.retained == 0 => {
                tracing::debug!("auto-sync found nothing queued");
            }
            Ok(report) => tracing::info!(
                applied = report.applied,
                dropped = report.dropped,
                retained = report.retained,
                "auto-sync finished"
            ),
            Err(err) => tracing::warn!(error = %err, "auto-sync failed"),
        }
    }

    /// Finds `id`, applies `change`, bumps the revision, persists, and
    /// submits an update action.
    async fn mutate<F>(&self, id: &TaskId, event: &'static str, change: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.lock().await;
        let index = Self::position(&tasks, id)?;

        let mut next = tasks.clone();
        let task = &mut next[index];
        change(task);
        task.touch(Utc::now());
        let updated = task.clone();

        self.store.replace_all(&next).await?;
        *tasks = next;

        let delivery = self.outbox.submit(OfflineAction::update(updated.clone())).await;
        tracing::info!(task_id = %id, revision = updated.revision, %delivery, "{event}");
        Ok(updated)
    }

    fn position(tasks: &[Task], id: &TaskId) -> Result<usize, TaskError> {
        tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))
    }

    fn validate_title(&self, title: &str) -> Result<String, TaskError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskError::TitleEmpty);
        }
        if title.chars().count() > self.max_title_len {
            return Err(TaskError::TitleTooLong {
                max: self.max_title_len,
            });
        }
        Ok(title.to_string())
    }
}
