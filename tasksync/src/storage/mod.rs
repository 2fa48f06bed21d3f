//! Key-value persistence for on-device state.
//!
//! Defines the [`KeyValueStore`] trait that every blob-backed component
//! (task snapshot, action log, session cache) writes through. Concrete
//! implementations:
//! - [`memory::MemoryStore`]: in-process map with failure injection for tests
//! - [`file::FileStore`]: one file per key with atomic replace

pub mod file;
pub mod memory;

/// Fixed keys of the on-device layout.
pub mod keys {
    /// Full task snapshot.
    pub const TASKS: &str = "tasks";
    /// Ordered pending-action list.
    pub const OFFLINE_ACTIONS: &str = "offline_actions";
    /// Cached user profile.
    pub const USER: &str = "user";
    /// Session token; only ever written to the secure store.
    pub const SESSION_TOKEN: &str = "session_token";
}

/// Errors that can occur during key-value storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying storage is full or unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write operation failed.
    #[error("write failed for key {key}: {reason}")]
    WriteFailed {
        /// Key being written.
        key: String,
        /// Description of the failure.
        reason: String,
    },

    /// A read operation failed.
    #[error("read failed for key {key}: {reason}")]
    ReadFailed {
        /// Key being read.
        key: String,
        /// Description of the failure.
        reason: String,
    },

    /// A stored blob could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] tasksync_model::codec::CodecError),
}

/// Async blob store addressed by fixed string keys.
///
/// Implementations must make [`set`](KeyValueStore::set) all-or-nothing from
/// the caller's perspective: a reader sees either the old blob or the new
/// one, never a partial write.
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`, or `None` if absent.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Replace the blob stored under `key`.
    fn set(
        &self,
        key: &str,
        blob: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Remove the blob stored under `key`. Removing an absent key succeeds.
    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}
