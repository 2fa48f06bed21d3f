//! In-memory implementation of [`Backend`] for testing.
//!
//! Documents keep insertion order. Fresh writes carry a pending server
//! timestamp until [`MemoryBackend::commit_pending`] resolves them, which
//! mirrors how a document store reports latency-compensated writes.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use parking_lot::Mutex;

use tasksync_model::document::{ServerTimestamp, TaskDocument};
use tasksync_model::task::{Task, TaskId};

use super::{Backend, BackendError, ListQuery, check_revision};

/// In-process document store.
#[derive(Debug)]
pub struct MemoryBackend {
    docs: Mutex<Vec<TaskDocument>>,
    available: AtomicBool,
    soft_delete: bool,
    /// Remaining successful writes before the backend goes unavailable.
    write_budget: Mutex<Option<usize>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty, reachable backend that hard-deletes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            soft_delete: false,
            write_budget: Mutex::new(None),
        }
    }

    /// Create an empty backend that keeps tombstones on delete.
    #[must_use]
    pub fn with_soft_delete() -> Self {
        Self {
            soft_delete: true,
            ..Self::new()
        }
    }

    /// Make the backend reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Allow only `writes` more successful writes, after which the backend
    /// becomes unavailable. `None` lifts the limit.
    pub fn set_write_budget(&self, writes: Option<usize>) {
        *self.write_budget.lock() = writes;
    }

    /// Resolve every pending server timestamp to now.
    pub fn commit_pending(&self) {
        let now = Utc::now();
        for doc in self.docs.lock().iter_mut() {
            if doc.written_at.is_pending() {
                doc.written_at = ServerTimestamp::At(now);
            }
        }
    }

    /// Snapshot of every stored document, tombstones included.
    #[must_use]
    pub fn documents(&self) -> Vec<TaskDocument> {
        self.docs.lock().clone()
    }

    /// Live (non-deleted) tasks in insertion order.
    #[must_use]
    pub fn live_tasks(&self) -> Vec<Task> {
        self.docs
            .lock()
            .iter()
            .filter(|d| !d.deleted)
            .map(|d| d.task.clone())
            .collect()
    }

    /// Insert a document directly, bypassing availability and revisions.
    pub fn seed(&self, doc: TaskDocument) {
        let mut docs = self.docs.lock();
        if let Some(slot) = docs.iter_mut().find(|d| d.task.id == doc.task.id) {
            *slot = doc;
        } else {
            docs.push(doc);
        }
    }

    fn check_reachable(&self) -> Result<(), BackendError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("memory backend offline".to_string()));
        }
        Ok(())
    }

    fn begin_write(&self) -> Result<(), BackendError> {
        self.check_reachable()?;
        let exhausted = {
            let mut budget = self.write_budget.lock();
            match budget.as_mut() {
                Some(0) => true,
                Some(n) => {
                    *n -= 1;
                    false
                }
                None => false,
            }
        };
        if exhausted {
            self.set_available(false);
            return Err(BackendError::Unavailable("write budget exhausted".to_string()));
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    async fn create_task(&self, task: &Task) -> Result<TaskId, BackendError> {
        self.begin_write()?;
        let mut docs = self.docs.lock();
        let position = docs.iter().position(|d| d.task.id == task.id);
        check_revision(position.map(|i| &docs[i]), task)?;
        let doc = TaskDocument::pending(task.clone());
        match position {
            Some(i) => docs[i] = doc,
            None => docs.push(doc),
        }
        Ok(task.id.clone())
    }

    async fn update_task(&self, task: &Task) -> Result<(), BackendError> {
        self.begin_write()?;
        let mut docs = self.docs.lock();
        let Some(slot) = docs.iter_mut().find(|d| d.task.id == task.id && !d.deleted) else {
            return Err(BackendError::NotFound(task.id.clone()));
        };
        check_revision(Some(&*slot), task)?;
        *slot = TaskDocument::pending(task.clone());
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskDocument>, BackendError> {
        self.check_reachable()?;
        Ok(self.docs.lock().iter().find(|d| &d.task.id == id).cloned())
    }

    async fn list_tasks(&self, query: &ListQuery) -> Result<Vec<TaskDocument>, BackendError> {
        self.check_reachable()?;
        let mut docs: Vec<TaskDocument> = self
            .docs
            .lock()
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        query.sort(&mut docs);
        Ok(docs)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), BackendError> {
        self.begin_write()?;
        let mut docs = self.docs.lock();
        let Some(index) = docs.iter().position(|d| &d.task.id == id) else {
            return Err(BackendError::NotFound(id.clone()));
        };
        if self.soft_delete {
            let doc = &mut docs[index];
            if !doc.deleted {
                doc.deleted = true;
                doc.task.touch(Utc::now());
                doc.written_at = ServerTimestamp::Pending;
            }
        } else {
            docs.remove(index);
        }
        Ok(())
    }
}
