//! Durable FIFO log of offline actions.
//!
//! The log is one blob holding the ordered action list. Every mutation is a
//! read-modify-write of that blob, serialized by a lock shared between all
//! clones of the same [`ActionLog`]. Actions are never deduplicated or
//! reordered.

use std::sync::Arc;

use tokio::sync::Mutex;

use tasksync_model::action::{ActionId, OfflineAction};
use tasksync_model::codec::{self, BlobFormat};

use crate::storage::{KeyValueStore, StorageError, keys};

/// Append-only queue of pending mutations, oldest first.
pub struct ActionLog<K: KeyValueStore> {
    kv: Arc<K>,
    format: BlobFormat,
    /// Serializes read-modify-write cycles on the log blob.
    write_lock: Arc<Mutex<()>>,
}

impl<K: KeyValueStore> Clone for ActionLog<K> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            format: self.format,
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl<K: KeyValueStore> ActionLog<K> {
    /// Create an action log writing through `kv`.
    #[must_use]
    pub fn new(kv: Arc<K>, format: BlobFormat) -> Self {
        Self {
            kv,
            format,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append `action` to the end of the log.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log cannot be read, decoded or written.
    pub async fn append(&self, action: OfflineAction) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut actions = self.read().await?;
        let kind = action.kind();
        let task_id = action.task_id().clone();
        actions.push(action);
        self.write(&actions).await?;
        tracing::info!(
            %kind,
            %task_id,
            queue_len = actions.len(),
            "action queued for offline replay"
        );
        Ok(actions.len())
    }

    /// Return every pending action in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log cannot be read or decoded. A
    /// corrupt log is reported rather than treated as empty.
    pub async fn list(&self) -> Result<Vec<OfflineAction>, StorageError> {
        self.read().await
    }

    /// Number of pending actions.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log cannot be read or decoded.
    pub async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.read().await?.len())
    }

    /// Returns `true` if no actions are pending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log cannot be read or decoded.
    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.read().await?.is_empty())
    }

    /// Drop every pending action.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log blob cannot be removed.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.kv.remove(keys::OFFLINE_ACTIONS).await?;
        tracing::debug!("action log cleared");
        Ok(())
    }

    /// Remove the action with `id`. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log cannot be read, decoded or written.
    pub async fn remove(&self, id: &ActionId) -> Result<bool, StorageError> {
        Ok(self.remove_many(std::slice::from_ref(id)).await? == 1)
    }

    /// Remove every action whose id is in `ids`, keeping the order of the
    /// rest. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the log cannot be read, decoded or written.
    pub async fn remove_many(&self, ids: &[ActionId]) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        let mut actions = self.read().await?;
        let before = actions.len();
        actions.retain(|a| !ids.contains(&a.id));
        let removed = before - actions.len();
        if removed > 0 {
            if actions.is_empty() {
                self.kv.remove(keys::OFFLINE_ACTIONS).await?;
            } else {
                self.write(&actions).await?;
            }
        }
        tracing::debug!(removed, remaining = actions.len(), "actions removed from log");
        Ok(removed)
    }

    async fn read(&self) -> Result<Vec<OfflineAction>, StorageError> {
        match self.kv.get(keys::OFFLINE_ACTIONS).await? {
            Some(blob) => Ok(codec::decode(self.format, &blob)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write(&self, actions: &[OfflineAction]) -> Result<(), StorageError> {
        let blob = codec::encode(self.format, actions)?;
        self.kv.set(keys::OFFLINE_ACTIONS, blob).await
    }
}
