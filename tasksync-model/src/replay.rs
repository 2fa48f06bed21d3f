//! Pure fold of offline actions into a task snapshot.
//!
//! Applying an action never fails: an `UPDATE` for an unknown task is
//! dropped and a `DELETE` for an unknown task is a no-op. A `CREATE` whose
//! task id is already present replaces that task in place, so folding the
//! same log twice yields the same snapshot.

use crate::action::{ActionPayload, OfflineAction};
use crate::task::Task;

/// Outcome of folding a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// A new task was appended.
    Inserted,
    /// An existing task was replaced.
    Replaced,
    /// A task was removed.
    Removed,
    /// The action targeted a task that is not in the snapshot.
    Skipped,
}

/// Folds one action into `tasks`, preserving the relative order of
/// untouched tasks.
pub fn apply_action(tasks: &mut Vec<Task>, action: &OfflineAction) -> FoldOutcome {
    match &action.payload {
        ActionPayload::Create(task) => {
            if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
                *slot = task.clone();
                FoldOutcome::Replaced
            } else {
                tasks.push(task.clone());
                FoldOutcome::Inserted
            }
        }
        ActionPayload::Update(task) => match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task.clone();
                FoldOutcome::Replaced
            }
            None => FoldOutcome::Skipped,
        },
        ActionPayload::Delete(id) => match tasks.iter().position(|t| &t.id == id) {
            Some(index) => {
                tasks.remove(index);
                FoldOutcome::Removed
            }
            None => FoldOutcome::Skipped,
        },
    }
}

/// Folds every action in order and returns the resulting snapshot.
#[must_use]
pub fn replay(mut tasks: Vec<Task>, actions: &[OfflineAction]) -> Vec<Task> {
    for action in actions {
        apply_action(&mut tasks, action);
    }
    tasks
}
