//! Pure merge of remote task documents into the local snapshot.
//!
//! Each task carries a revision bumped on every mutation. The copy with the
//! higher revision wins; on equal revisions the later `updated_at` wins, and
//! a full tie keeps the local copy so merging is idempotent. Tombstones
//! remove the local task when their revision is at least the local one.

use tasksync_model::document::TaskDocument;
use tasksync_model::task::Task;

/// Counts of what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Remote tasks that were unknown locally.
    pub added: usize,
    /// Local tasks overwritten by a newer remote copy.
    pub replaced: usize,
    /// Local tasks removed by a remote tombstone.
    pub removed: usize,
}

impl MergeSummary {
    /// Returns `true` if the merge left the snapshot untouched.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.added == 0 && self.replaced == 0 && self.removed == 0
    }
}

/// Returns `true` if `remote` should replace `local`.
#[must_use]
pub fn remote_wins(local: &Task, remote: &Task) -> bool {
    remote.revision > local.revision
        || (remote.revision == local.revision && remote.updated_at > local.updated_at)
}

/// Merges `remote` documents into `local`.
///
/// Untouched local tasks keep their relative order; newly seen remote tasks
/// are appended in the order given. Local-only tasks are kept.
pub fn merge_task_list(local: &mut Vec<Task>, remote: &[TaskDocument]) -> MergeSummary {
    let mut summary = MergeSummary::default();
    for doc in remote {
        let position = local.iter().position(|t| t.id == doc.task.id);
        match (position, doc.deleted) {
            (Some(i), true) => {
                if doc.task.revision >= local[i].revision {
                    local.remove(i);
                    summary.removed += 1;
                }
            }
            (Some(i), false) => {
                if remote_wins(&local[i], &doc.task) {
                    local[i] = doc.task.clone();
                    summary.replaced += 1;
                }
            }
            (None, true) => {}
            (None, false) => {
                local.push(doc.task.clone());
                summary.added += 1;
            }
        }
    }
    summary
}
