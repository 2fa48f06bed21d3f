//! Durable task snapshot.
//!
//! The whole task collection is one blob: callers compute the full new list
//! and replace it. A failed read degrades to an empty collection so the app
//! can still start; a failed write is reported to the caller.

use std::sync::Arc;

use tasksync_model::codec::{self, BlobFormat};
use tasksync_model::task::Task;

use crate::storage::{KeyValueStore, StorageError, keys};

/// Read/replace access to the persisted task snapshot.
pub struct TaskStore<K: KeyValueStore> {
    kv: Arc<K>,
    format: BlobFormat,
}

impl<K: KeyValueStore> Clone for TaskStore<K> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            format: self.format,
        }
    }
}

impl<K: KeyValueStore> TaskStore<K> {
    /// Create a task store writing through `kv`.
    #[must_use]
    pub const fn new(kv: Arc<K>, format: BlobFormat) -> Self {
        Self { kv, format }
    }

    /// Load every persisted task.
    ///
    /// Returns an empty collection when nothing is stored, and also when the
    /// blob cannot be read or decoded (logged at `warn`).
    pub async fn get_all(&self) -> Vec<Task> {
        let blob = match self.kv.get(keys::TASKS).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "task snapshot unreadable, starting empty");
                return Vec::new();
            }
        };
        match codec::decode(self.format, &blob) {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    bytes = blob.len(),
                    "task snapshot undecodable, starting empty"
                );
                Vec::new()
            }
        }
    }

    /// Overwrite the persisted snapshot with `tasks`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the snapshot cannot be encoded or written;
    /// the previous snapshot is left in place.
    pub async fn replace_all(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let blob = codec::encode(self.format, tasks)?;
        self.kv.set(keys::TASKS, blob).await?;
        tracing::debug!(count = tasks.len(), "task snapshot persisted");
        Ok(())
    }
}
