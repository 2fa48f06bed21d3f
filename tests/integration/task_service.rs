//! Integration tests for the task service facade.
//!
//! Covers validation, not-found handling, snapshot persistence, the
//! offline fallback of every mutating operation, and serialization of
//! concurrent mutations.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

use std::sync::Arc;

use tasksync::backend::memory::MemoryBackend;
use tasksync::connectivity::ConnectivityMonitor;
use tasksync::connectivity::manual::ManualProbe;
use tasksync::storage::memory::MemoryStore;
use tasksync::storage::keys;
use tasksync::tasks::{NewTask, ServiceSettings, SortKey, TaskError, TaskPatch, TaskQuery, TaskService};
use tasksync_model::action::ActionKind;
use tasksync_model::codec::{self, BlobFormat};
use tasksync_model::task::{Task, TaskId, TaskStatus};

type Service = TaskService<MemoryStore, MemoryBackend, ManualProbe>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

struct Harness {
    kv: Arc<MemoryStore>,
    backend: Arc<MemoryBackend>,
    monitor: Arc<ConnectivityMonitor<ManualProbe>>,
    service: Arc<Service>,
}

async fn harness(online: bool) -> Harness {
    let kv = Arc::new(MemoryStore::new());
    let backend = Arc::new(MemoryBackend::new());
    let monitor = Arc::new(ConnectivityMonitor::new(ManualProbe::new(online)));
    let settings = ServiceSettings {
        user_id: "ada".to_string(),
        ..ServiceSettings::default()
    };
    let service = Arc::new(
        TaskService::open(Arc::clone(&kv), Arc::clone(&backend), Arc::clone(&monitor), settings).await,
    );
    Harness {
        kv,
        backend,
        monitor,
        service,
    }
}

fn persisted(kv: &MemoryStore) -> Vec<Task> {
    kv.raw(keys::TASKS)
        .map(|blob| codec::decode(BlobFormat::Json, &blob).unwrap())
        .unwrap_or_default()
}

fn new_task(title: &str, description: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: description.to_string(),
        due_date: None,
    }
}

// ===========================================================================
// Create
// ===========================================================================

#[tokio::test]
async fn create_returns_fresh_not_started_task() {
    let h = harness(true).await;
    let a = h.service.create_task(new_task("A", "first")).await.unwrap();
    let b = h.service.create_task(new_task("B", "")).await.unwrap();

    for task in [&a, &b] {
        assert!(!task.completed);
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert_eq!(task.assigned_date, task.created_at);
        assert_eq!(task.user_id, "ada");
        assert!(task.is_consistent());
    }
    assert_ne!(a.id, b.id);
    assert_eq!(persisted(&h.kv), vec![a.clone(), b.clone()]);
    assert_eq!(h.backend.live_tasks(), vec![a, b]);
}

#[tokio::test]
async fn invalid_titles_never_persist() {
    let h = harness(true).await;
    assert!(matches!(
        h.service.create_task(new_task("", "x")).await,
        Err(TaskError::TitleEmpty)
    ));
    let long = "x".repeat(257);
    assert!(matches!(
        h.service.create_task(new_task(&long, "")).await,
        Err(TaskError::TitleTooLong { max: 256 })
    ));
    assert_eq!(h.kv.write_count(), 0);
    assert!(h.service.list_tasks().await.is_empty());
}

#[tokio::test]
async fn title_at_limit_is_accepted() {
    let h = harness(true).await;
    let exact = "é".repeat(256);
    let task = h.service.create_task(new_task(&exact, "")).await.unwrap();
    assert_eq!(task.title.chars().count(), 256);
}

// ===========================================================================
// Not found
// ===========================================================================

#[tokio::test]
async fn unknown_id_fails_without_any_write() {
    let h = harness(true).await;
    h.service.create_task(new_task("A", "")).await.unwrap();
    let writes = h.kv.write_count();
    let missing = TaskId::new();

    let patch = TaskPatch {
        title: Some("X".to_string()),
        ..TaskPatch::default()
    };
    assert!(matches!(
        h.service.update_task(&missing, patch).await,
        Err(TaskError::TaskNotFound(id)) if id == missing
    ));
    assert!(matches!(
        h.service.delete_task(&missing).await,
        Err(TaskError::TaskNotFound(_))
    ));
    assert!(matches!(
        h.service.toggle_task_complete(&missing).await,
        Err(TaskError::TaskNotFound(_))
    ));
    assert!(matches!(
        h.service.change_status(&missing, TaskStatus::InProgress).await,
        Err(TaskError::TaskNotFound(_))
    ));

    assert_eq!(h.kv.write_count(), writes);
}

// ===========================================================================
// Update / toggle / status / delete
// ===========================================================================

#[tokio::test]
async fn update_refreshes_timestamp_and_revision() {
    let h = harness(true).await;
    let task = h.service.create_task(new_task("A", "")).await.unwrap();

    let patch = TaskPatch {
        title: Some("  Renamed ".to_string()),
        ..TaskPatch::default()
    };
    let updated = h.service.update_task(&task.id, patch).await.unwrap();

    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.created_at, task.created_at);
    assert!(updated.updated_at >= task.updated_at);
    assert_eq!(updated.revision, task.revision + 1);
    assert_eq!(persisted(&h.kv), vec![updated.clone()]);
    assert_eq!(h.backend.live_tasks(), vec![updated]);
}

#[tokio::test]
async fn toggle_twice_restores_completion() {
    let h = harness(true).await;
    let task = h.service.create_task(new_task("A", "")).await.unwrap();

    let once = h.service.toggle_task_complete(&task.id).await.unwrap();
    assert!(once.completed);
    assert_eq!(once.status, TaskStatus::Completed);

    let twice = h.service.toggle_task_complete(&task.id).await.unwrap();
    assert_eq!(twice.completed, task.completed);
    assert_eq!(twice.status, TaskStatus::NotStarted);
    assert_eq!(twice.revision, 3);
}

#[tokio::test]
async fn change_status_keeps_completed_in_step() {
    let h = harness(true).await;
    let task = h.service.create_task(new_task("A", "")).await.unwrap();

    let done = h.service.change_status(&task.id, TaskStatus::Completed).await.unwrap();
    assert!(done.completed);
    let reopened = h.service.change_status(&task.id, TaskStatus::InProgress).await.unwrap();
    assert!(!reopened.completed);
    assert!(reopened.is_consistent());
}

#[tokio::test]
async fn delete_removes_exactly_one_and_keeps_order() {
    let h = harness(true).await;
    let a = h.service.create_task(new_task("A", "")).await.unwrap();
    let b = h.service.create_task(new_task("B", "")).await.unwrap();
    let c = h.service.create_task(new_task("C", "")).await.unwrap();

    h.service.delete_task(&b.id).await.unwrap();

    assert_eq!(h.service.list_tasks().await, vec![a.clone(), c.clone()]);
    assert_eq!(persisted(&h.kv), vec![a, c]);
    assert!(h.backend.documents().iter().all(|d| d.task.id != b.id));
}

// ===========================================================================
// Storage failures
// ===========================================================================

#[tokio::test]
async fn storage_failure_is_fatal_and_leaves_snapshot() {
    let h = harness(false).await;
    let task = h.service.create_task(new_task("A", "")).await.unwrap();
    let queued = h.service.pending_actions().await.unwrap().len();

    h.kv.set_fail_writes(true);
    let err = h.service.toggle_task_complete(&task.id).await.unwrap_err();
    assert!(matches!(err, TaskError::Storage(_)));
    assert!(matches!(
        h.service.create_task(new_task("B", "")).await,
        Err(TaskError::Storage(_))
    ));

    h.kv.set_fail_writes(false);
    assert_eq!(h.service.list_tasks().await, vec![task]);
    assert_eq!(h.service.pending_actions().await.unwrap().len(), queued);
}

// ===========================================================================
// Offline fallback
// ===========================================================================

#[tokio::test]
async fn every_offline_mutation_queues_exactly_one_action() {
    let h = harness(false).await;

    let task = h.service.create_task(new_task("A", "")).await.unwrap();
    assert_eq!(h.service.pending_actions().await.unwrap().len(), 1);

    h.service
        .update_task(
            &task.id,
            TaskPatch {
                description: Some("more".to_string()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(h.service.pending_actions().await.unwrap().len(), 2);

    h.service.toggle_task_complete(&task.id).await.unwrap();
    assert_eq!(h.service.pending_actions().await.unwrap().len(), 3);

    h.service.change_status(&task.id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(h.service.pending_actions().await.unwrap().len(), 4);

    h.service.delete_task(&task.id).await.unwrap();
    let kinds: Vec<ActionKind> = h
        .service
        .pending_actions()
        .await
        .unwrap()
        .iter()
        .map(|a| a.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            ActionKind::Create,
            ActionKind::Update,
            ActionKind::Update,
            ActionKind::Update,
            ActionKind::Delete,
        ]
    );
    assert!(h.backend.documents().is_empty());
}

#[tokio::test]
async fn backend_outage_while_online_also_queues() {
    let h = harness(true).await;
    h.backend.set_available(false);

    let task = h.service.create_task(new_task("A", "")).await.unwrap();

    assert_eq!(h.service.list_tasks().await, vec![task]);
    assert_eq!(h.service.pending_actions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn queue_failure_is_swallowed() {
    let h = harness(false).await;
    let task = h.service.create_task(new_task("A", "")).await.unwrap();

    // Corrupt the log so appends fail while the snapshot still saves.
    h.kv.put_raw(keys::OFFLINE_ACTIONS, b"{not a log".to_vec());
    let toggled = h.service.toggle_task_complete(&task.id).await.unwrap();

    assert!(toggled.completed);
    assert_eq!(persisted(&h.kv), vec![toggled]);
    assert!(h.service.pending_actions().await.is_err());
}

// ===========================================================================
// Filtering through the facade
// ===========================================================================

#[tokio::test]
async fn filter_intersects_text_and_status() {
    let h = harness(true).await;
    let report = h.service.create_task(new_task("Quarterly report", "")).await.unwrap();
    let draft = h.service.create_task(new_task("Draft", "for the REPORT")).await.unwrap();
    h.service.create_task(new_task("Groceries", "")).await.unwrap();
    h.service.change_status(&report.id, TaskStatus::Completed).await.unwrap();

    let query = TaskQuery {
        text: Some("report".to_string()),
        status: Some(TaskStatus::NotStarted),
        sort: SortKey::Title,
    };
    let found = h.service.filter_tasks(&query).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, draft.id);
}

// ===========================================================================
// Single writer
// ===========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_are_all_kept() {
    let h = harness(false).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = Arc::clone(&h.service);
        handles.push(tokio::spawn(async move {
            service.create_task(new_task(&format!("task {i}"), "")).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.service.list_tasks().await.len(), 20);
    assert_eq!(persisted(&h.kv).len(), 20);
    assert_eq!(h.service.pending_actions().await.unwrap().len(), 20);
    assert!(!h.monitor.current().unwrap().is_online());
}
