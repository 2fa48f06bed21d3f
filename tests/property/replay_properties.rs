//! Property-based tests for the offline action fold.
//!
//! Uses proptest to verify:
//! 1. Replaying a log twice yields the same snapshot as replaying it once.
//! 2. `CREATE → UPDATE → DELETE` of one task is net-zero on any snapshot
//!    that does not already contain it.
//! 3. `DELETE` removes exactly one task and keeps the others in order.
//! 4. Every folded task still satisfies `completed == (status == Completed)`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use tasksync_model::action::OfflineAction;
use tasksync_model::replay::replay;
use tasksync_model::task::{Task, TaskId, TaskStatus};
use uuid::Uuid;

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    any::<u128>().prop_map(|n| TaskId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating timestamps within a sane range.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

/// Strategy for generating `TaskStatus` values.
fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::NotStarted),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Completed),
    ]
}

/// Strategy for generating consistent tasks.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        "[a-zA-Z ]{1,32}",
        ".{0,64}",
        arb_status(),
        arb_instant(),
        proptest::option::of(arb_instant()),
        1u64..100,
    )
        .prop_map(|(id, title, description, status, at, due_date, revision)| Task {
            id,
            title,
            description,
            status,
            completed: status == TaskStatus::Completed,
            assigned_date: at,
            due_date,
            created_at: at,
            updated_at: at,
            user_id: "user-1".to_string(),
            revision,
        })
}

/// Strategy for a snapshot of tasks with unique ids.
fn arb_snapshot() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task(), 0..8).prop_map(|mut tasks| {
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks.dedup_by(|a, b| a.id == b.id);
        tasks
    })
}

/// Strategy for an action log touching tasks from `snapshot` and new ones.
fn arb_log(snapshot: Vec<Task>) -> impl Strategy<Value = Vec<OfflineAction>> {
    let known = snapshot;
    prop::collection::vec((0u8..3, arb_task(), any::<prop::sample::Index>()), 0..12).prop_map(
        move |ops| {
            ops.into_iter()
                .map(|(kind, fresh, pick)| {
                    let target = if known.is_empty() {
                        fresh.clone()
                    } else {
                        let mut t = known[pick.index(known.len())].clone();
                        t.title = fresh.title.clone();
                        t
                    };
                    match kind {
                        0 => OfflineAction::create(fresh),
                        1 => OfflineAction::update(target),
                        _ => OfflineAction::delete(target.id),
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn replay_is_idempotent((snapshot, log) in arb_snapshot().prop_flat_map(|s| {
        let log = arb_log(s.clone());
        (Just(s), log)
    })) {
        let once = replay(snapshot, &log);
        let twice = replay(once.clone(), &log);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn create_update_delete_is_net_zero(snapshot in arb_snapshot(), task in arb_task()) {
        prop_assume!(snapshot.iter().all(|t| t.id != task.id));
        let mut renamed = task.clone();
        renamed.title = "X".to_string();
        let log = vec![
            OfflineAction::create(task.clone()),
            OfflineAction::update(renamed),
            OfflineAction::delete(task.id),
        ];
        prop_assert_eq!(replay(snapshot.clone(), &log), snapshot);
    }

    #[test]
    fn delete_removes_exactly_one(snapshot in arb_snapshot(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!snapshot.is_empty());
        let victim = snapshot[pick.index(snapshot.len())].id.clone();
        let result = replay(snapshot.clone(), &[OfflineAction::delete(victim.clone())]);
        let expected: Vec<Task> = snapshot.into_iter().filter(|t| t.id != victim).collect();
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn folded_tasks_stay_consistent((snapshot, log) in arb_snapshot().prop_flat_map(|s| {
        let log = arb_log(s.clone());
        (Just(s), log)
    })) {
        for task in replay(snapshot, &log) {
            prop_assert!(task.is_consistent());
        }
    }
}
