//! # Persistence Adapters
//!
//! The engine's durability story is deliberately thin: serialize the map
//! to a snapshot blob, hand the bytes to a `SnapshotStore`, and load them
//! back on startup. The store is a narrow capability: the engine never
//! knows whether bytes land in a file, a test fixture, or something else
//! entirely, and a failed store call never mutates engine state.
//!
//! ## Save Points
//!
//! Saves happen between engine operations, never mid-probe:
//!
//! - explicitly, via `save()` / `close()`;
//! - on the periodic tick (`SaveTicker`), evaluated at the end of
//!   mutating operations; a failed periodic save is logged and not
//!   retried;
//! - after `compact()`, when a periodic save is configured.
//!
//! ## Missing Data
//!
//! `load` returning `None` means "nothing stored yet" and yields a fresh
//! map. Only actual adapter failures are errors.
//!
//! ## Module Organization
//!
//! - [`file`]: directory-backed store, tmp-file + rename on save
//! - [`memory`]: in-process store for tests and ephemeral maps
//! - [`autosave`]: the periodic save ticker

mod autosave;
mod file;
mod memory;

pub use autosave::SaveTicker;
pub use file::FileStore;
pub use memory::MemoryStore;

use eyre::Result;

/// Where snapshot bytes are kept between process runs.
pub trait SnapshotStore {
    /// Stores `bytes` under `key`, replacing any previous blob.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetches the blob stored under `key`, or `None` when nothing has
    /// been stored yet.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Which concrete store a builder should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Directory of snapshot files.
    File,
    /// Process-local, for tests and ephemeral maps.
    Memory,
    /// Pick the best available backend (file-backed on native targets).
    Auto,
}

/// A configured adapter plus its periodic-save state, owned by the map.
pub(crate) struct PersistHandle {
    pub store: Box<dyn SnapshotStore>,
    pub key: String,
    pub ticker: Option<SaveTicker>,
}
