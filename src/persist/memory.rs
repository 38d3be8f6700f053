//! # In-Memory Snapshot Store
//!
//! Process-local store for tests and maps that want snapshot semantics
//! without touching a filesystem. Clones of a `MemoryStore` share one
//! backing map, so a test can hold a clone and inspect what the engine
//! saved.

use std::collections::HashMap;
use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;

use super::SnapshotStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs. Test hook.
    pub fn blob_count(&self) -> usize {
        self.blobs.lock().len()
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(key).cloned())
    }
}
