//! Shared-directory implementation of [`Backend`].
//!
//! Every task lives in `<root>/tasks/<id>.json` as a serialized
//! [`TaskDocument`]. Pointing several devices at the same synced or
//! network-mounted directory gives them a common collection. The root must
//! already exist: a missing root (unmounted share, detached drive) reads as
//! [`BackendError::Unavailable`] rather than being created on the spot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;

use tasksync_model::document::{ServerTimestamp, TaskDocument};
use tasksync_model::task::{Task, TaskId};

use super::{Backend, BackendError, ListQuery, check_revision};
use crate::storage::file::write_atomic;

const TASKS_DIR: &str = "tasks";
const DOC_EXTENSION: &str = "json";

/// Document store on a (possibly shared) directory.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    soft_delete: bool,
    /// Serializes read-check-write sequences from this process.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create a backend rooted at `root`. Deletes leave tombstones so other
    /// devices observe them on their next pull.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            soft_delete: true,
            write_lock: Mutex::new(()),
        }
    }

    /// Remove documents outright on delete instead of keeping tombstones.
    #[must_use]
    pub const fn hard_delete(mut self) -> Self {
        self.soft_delete = false;
        self
    }

    /// Root directory of the collection.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, id: &TaskId) -> PathBuf {
        self.root
            .join(TASKS_DIR)
            .join(format!("{}.{DOC_EXTENSION}", id.as_uuid().simple()))
    }

    async fn ensure_reachable(&self) -> Result<PathBuf, BackendError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(BackendError::Unavailable(format!(
                    "{} is not a directory",
                    self.root.display()
                )));
            }
            Err(e) => {
                return Err(BackendError::Unavailable(format!("{}: {e}", self.root.display())));
            }
        }
        let tasks_dir = self.root.join(TASKS_DIR);
        tokio::fs::create_dir_all(&tasks_dir)
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", tasks_dir.display())))?;
        Ok(tasks_dir)
    }

    async fn read_doc(path: &Path) -> Result<Option<TaskDocument>, BackendError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Unavailable(format!("{}: {e}", path.display()))),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BackendError::Rejected(format!("corrupt document {}: {e}", path.display())))
    }

    async fn write_doc(&self, doc: &TaskDocument) -> Result<(), BackendError> {
        let path = self.doc_path(&doc.task.id);
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| BackendError::Rejected(format!("encode {}: {e}", doc.task.id)))?;
        write_atomic(&path, &bytes, None)
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", path.display())))?;
        tracing::trace!(task_id = %doc.task.id, deleted = doc.deleted, "document written");
        Ok(())
    }

    fn stamped(task: &Task) -> TaskDocument {
        TaskDocument {
            task: task.clone(),
            deleted: false,
            written_at: ServerTimestamp::At(Utc::now()),
        }
    }
}

impl Backend for FileBackend {
    async fn create_task(&self, task: &Task) -> Result<TaskId, BackendError> {
        self.ensure_reachable().await?;
        let _guard = self.write_lock.lock().await;
        let existing = Self::read_doc(&self.doc_path(&task.id)).await?;
        check_revision(existing.as_ref(), task)?;
        self.write_doc(&Self::stamped(task)).await?;
        Ok(task.id.clone())
    }

    async fn update_task(&self, task: &Task) -> Result<(), BackendError> {
        self.ensure_reachable().await?;
        let _guard = self.write_lock.lock().await;
        let existing = Self::read_doc(&self.doc_path(&task.id)).await?;
        match existing {
            Some(doc) if !doc.deleted => {
                check_revision(Some(&doc), task)?;
                self.write_doc(&Self::stamped(task)).await
            }
            _ => Err(BackendError::NotFound(task.id.clone())),
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskDocument>, BackendError> {
        self.ensure_reachable().await?;
        Self::read_doc(&self.doc_path(id)).await
    }

    async fn list_tasks(&self, query: &ListQuery) -> Result<Vec<TaskDocument>, BackendError> {
        let tasks_dir = self.ensure_reachable().await?;
        let mut entries = tokio::fs::read_dir(&tasks_dir)
            .await
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", tasks_dir.display())))?;

        let mut docs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(BackendError::Unavailable(e.to_string())),
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOC_EXTENSION) {
                continue;
            }
            match Self::read_doc(&path).await {
                Ok(Some(doc)) if query.matches(&doc) => docs.push(doc),
                Ok(_) => {}
                Err(BackendError::Rejected(reason)) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping unreadable document");
                }
                Err(e) => return Err(e),
            }
        }
        query.sort(&mut docs);
        Ok(docs)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), BackendError> {
        self.ensure_reachable().await?;
        let _guard = self.write_lock.lock().await;
        let path = self.doc_path(id);
        let Some(mut doc) = Self::read_doc(&path).await? else {
            return Err(BackendError::NotFound(id.clone()));
        };

        if !self.soft_delete {
            return tokio::fs::remove_file(&path)
                .await
                .map_err(|e| BackendError::Unavailable(format!("{}: {e}", path.display())));
        }
        if doc.deleted {
            return Ok(());
        }
        let now = Utc::now();
        doc.deleted = true;
        doc.task.touch(now);
        doc.written_at = ServerTimestamp::At(now);
        self.write_doc(&doc).await
    }
}
