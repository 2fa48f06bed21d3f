//! Search, status filter and sort over a task snapshot.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tasksync_model::task::{Task, TaskStatus};

/// Sort order for [`filter_tasks`]. All orders are ascending and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Earliest assigned date first.
    #[default]
    AssignedDate,
    /// Earliest due date first; tasks without a due date last.
    DueDate,
    /// Title, case-insensitive, ties broken by exact comparison.
    Title,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssignedDate => write!(f, "assigned"),
            Self::DueDate => write!(f, "due"),
            Self::Title => write!(f, "title"),
        }
    }
}

/// Error returned when parsing an unknown sort key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort key {0:?} (expected assigned, due or title)")]
pub struct ParseSortKeyError(String);

impl FromStr for SortKey {
    type Err = ParseSortKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assigned" | "assigned_date" | "assigned-date" => Ok(Self::AssignedDate),
            "due" | "due_date" | "due-date" => Ok(Self::DueDate),
            "title" => Ok(Self::Title),
            other => Err(ParseSortKeyError(other.to_string())),
        }
    }
}

/// Search criteria. The default matches every task, in assigned-date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    /// Case-insensitive substring searched in title and description.
    pub text: Option<String>,
    /// Only tasks with exactly this status.
    pub status: Option<TaskStatus>,
    /// Result order.
    pub sort: SortKey,
}

impl TaskQuery {
    /// Returns `true` if `task` passes both the text and status predicates.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let status_ok = self.status.is_none_or(|s| task.status == s);
        let text_ok = self.text.as_deref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            task.title.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle)
        });
        status_ok && text_ok
    }
}

/// Returns the tasks matching `query`, sorted by `query.sort`.
#[must_use]
pub fn filter_tasks(tasks: &[Task], query: &TaskQuery) -> Vec<Task> {
    let mut result: Vec<Task> = tasks.iter().filter(|t| query.matches(t)).cloned().collect();
    match query.sort {
        SortKey::AssignedDate => result.sort_by_key(|t| t.assigned_date),
        SortKey::DueDate => result.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKey::Title => result.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
    }
    result
}
