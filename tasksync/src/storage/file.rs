//! Directory-backed implementation of [`KeyValueStore`].
//!
//! Each key maps to `<dir>/<key>.blob`. Writes go to a uniquely named
//! temporary file in the same directory which is then renamed over the
//! target, so readers never observe a half-written blob.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, StorageError};

const BLOB_EXTENSION: &str = "blob";

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    private: bool,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            private: false,
        })
    }

    /// Open a store whose directory and blobs are readable by the owner only.
    ///
    /// Used for the secure entry holding the session token.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the directory cannot be
    /// created or its permissions cannot be restricted.
    pub async fn open_private(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let mut store = Self::open(dir).await?;
        store.private = true;
        restrict_permissions(&store.dir, 0o700).await?;
        Ok(store)
    }

    /// Root directory of this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::Unavailable(format!("invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.{BLOB_EXTENSION}")))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let mode = self.private.then_some(0o600);
        write_atomic(&path, &blob, mode)
            .await
            .map_err(|e| StorageError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        tracing::trace!(key, bytes = blob.len(), "blob written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Write `bytes` to `path` through a sibling temporary file and a rename.
///
/// When `mode` is given the temporary file gets those permissions before it
/// becomes visible under `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8], mode: Option<u32>) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map_or_else(|| "blob".into(), |n| n.to_string_lossy());
    let tmp = dir.join(format!(".{name}.{}.tmp", uuid::Uuid::now_v7().simple()));

    let result = async {
        tokio::fs::write(&tmp, bytes).await?;
        if let Some(mode) = mode {
            set_mode(&tmp, mode).await?;
        }
        tokio::fs::rename(&tmp, path).await
    }
    .await;
    if result.is_err() {
        // The temp file may or may not exist depending on where it failed.
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

async fn restrict_permissions(path: &Path, mode: u32) -> Result<(), StorageError> {
    set_mode(path, mode)
        .await
        .map_err(|e| StorageError::Unavailable(format!("{}: {e}", path.display())))
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
