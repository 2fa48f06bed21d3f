//! Integration tests for the offline action log and the outbox.
//!
//! Verifies FIFO order, absence of deduplication, durability across
//! reopen, selective removal, corrupt-log reporting, and the outbox's
//! send-or-queue decision.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;

use tasksync::backend::memory::MemoryBackend;
use tasksync::connectivity::ConnectivityMonitor;
use tasksync::connectivity::manual::ManualProbe;
use tasksync::storage::file::FileStore;
use tasksync::storage::memory::MemoryStore;
use tasksync::storage::{StorageError, keys};
use tasksync::sync::{ActionLog, Delivery, Outbox};
use tasksync_model::action::{ActionKind, OfflineAction};
use tasksync_model::codec::BlobFormat;
use tasksync_model::task::{Task, TaskId, TaskStatus};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn make_task(title: &str) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::new(),
        title: title.to_string(),
        description: String::new(),
        status: TaskStatus::NotStarted,
        completed: false,
        assigned_date: now,
        due_date: None,
        created_at: now,
        updated_at: now,
        user_id: "ada".to_string(),
        revision: 1,
    }
}

fn memory_log() -> (Arc<MemoryStore>, ActionLog<MemoryStore>) {
    let kv = Arc::new(MemoryStore::new());
    let log = ActionLog::new(Arc::clone(&kv), BlobFormat::Json);
    (kv, log)
}

// ===========================================================================
// Action log
// ===========================================================================

#[tokio::test]
async fn list_preserves_append_order() {
    let (_kv, log) = memory_log();
    let task = make_task("a");
    let actions = vec![
        OfflineAction::create(task.clone()),
        OfflineAction::update(task.clone()),
        OfflineAction::delete(task.id.clone()),
    ];
    for action in &actions {
        log.append(action.clone()).await.unwrap();
    }
    assert_eq!(log.list().await.unwrap(), actions);
}

#[tokio::test]
async fn identical_payloads_are_not_deduplicated() {
    let (_kv, log) = memory_log();
    let task = make_task("a");
    log.append(OfflineAction::update(task.clone())).await.unwrap();
    log.append(OfflineAction::update(task)).await.unwrap();
    assert_eq!(log.len().await.unwrap(), 2);
}

#[tokio::test]
async fn remove_many_keeps_remaining_order() {
    let (kv, log) = memory_log();
    let a = OfflineAction::create(make_task("a"));
    let b = OfflineAction::create(make_task("b"));
    let c = OfflineAction::create(make_task("c"));
    for action in [&a, &b, &c] {
        log.append(action.clone()).await.unwrap();
    }

    let removed = log.remove_many(&[a.id.clone(), c.id.clone()]).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(log.list().await.unwrap(), vec![b.clone()]);

    assert!(log.remove(&b.id).await.unwrap());
    assert!(!log.remove(&b.id).await.unwrap());
    assert!(log.is_empty().await.unwrap());
    assert!(kv.raw(keys::OFFLINE_ACTIONS).is_none());
}

#[tokio::test]
async fn clear_drops_everything() {
    let (_kv, log) = memory_log();
    log.append(OfflineAction::create(make_task("a"))).await.unwrap();
    log.clear().await.unwrap();
    assert!(log.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_log_is_an_error_not_empty() {
    let (kv, log) = memory_log();
    kv.put_raw(keys::OFFLINE_ACTIONS, b"garbage".to_vec());
    assert!(matches!(log.list().await, Err(StorageError::Codec(_))));
    assert!(log.append(OfflineAction::create(make_task("a"))).await.is_err());
    assert_eq!(kv.raw(keys::OFFLINE_ACTIONS), Some(b"garbage".to_vec()));
}

#[tokio::test]
async fn log_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let action = OfflineAction::create(make_task("durable"));
    {
        let kv = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let log = ActionLog::new(kv, BlobFormat::Postcard);
        log.append(action.clone()).await.unwrap();
    }

    let kv = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let log = ActionLog::new(kv, BlobFormat::Postcard);
    assert_eq!(log.list().await.unwrap(), vec![action]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_from_clones_are_all_kept() {
    let (_kv, log) = memory_log();
    let mut handles = Vec::new();
    for i in 0..16 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            log.append(OfflineAction::create(make_task(&format!("t{i}"))))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(log.len().await.unwrap(), 16);
}

// ===========================================================================
// Outbox
// ===========================================================================

struct OutboxHarness {
    backend: Arc<MemoryBackend>,
    monitor: Arc<ConnectivityMonitor<ManualProbe>>,
    log: ActionLog<MemoryStore>,
    outbox: Outbox<MemoryStore, MemoryBackend, ManualProbe>,
}

fn outbox_harness(online: bool) -> OutboxHarness {
    let (_kv, log) = memory_log();
    let backend = Arc::new(MemoryBackend::new());
    let monitor = Arc::new(ConnectivityMonitor::new(ManualProbe::new(online)));
    let outbox = Outbox::new(Arc::clone(&backend), log.clone(), Arc::clone(&monitor));
    OutboxHarness {
        backend,
        monitor,
        log,
        outbox,
    }
}

#[tokio::test]
async fn outbox_follows_connectivity_changes() {
    let h = outbox_harness(true);
    let first = make_task("first");
    assert_eq!(h.outbox.submit(OfflineAction::create(first)).await, Delivery::Sent);

    h.monitor.probe().set_online(false);
    let second = make_task("second");
    assert_eq!(
        h.outbox.submit(OfflineAction::create(second.clone())).await,
        Delivery::Queued
    );

    let queued = h.log.list().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].kind(), ActionKind::Create);
    assert_eq!(queued[0].task_id(), &second.id);
    assert_eq!(h.backend.live_tasks().len(), 1);
}

#[tokio::test]
async fn outbox_queues_stale_update_refused_by_backend() {
    let h = outbox_harness(true);
    let mut task = make_task("a");
    task.revision = 4;
    h.backend.seed(tasksync_model::document::TaskDocument::pending(task.clone()));

    task.revision = 2;
    assert_eq!(h.outbox.submit(OfflineAction::update(task)).await, Delivery::Queued);
    assert_eq!(h.log.len().await.unwrap(), 1);
}
