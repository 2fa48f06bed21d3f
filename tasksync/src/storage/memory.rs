//! In-memory implementation of [`KeyValueStore`].
//!
//! Not persistent: all data is lost when the process exits. Reads and writes
//! can be made to fail on demand so callers' error paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{KeyValueStore, StorageError};

/// In-memory blob store keyed by string.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set`/`remove` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set`/`remove` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns a copy of the raw blob under `key`, bypassing failure injection.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(key).cloned()
    }

    /// Overwrites the raw blob under `key`, bypassing failure injection.
    pub fn put_raw(&self, key: &str, blob: Vec<u8>) {
        self.blobs.lock().insert(key.to_string(), blob);
    }

    fn check_write(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<(), StorageError> {
        self.check_write(key)?;
        self.blobs.lock().insert(key.to_string(), blob);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_write(key)?;
        self.blobs.lock().remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
