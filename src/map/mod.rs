//! # Map Engine
//!
//! The hash-table protocol over the paged log: probing, insert, lookup,
//! delete, update, resize, compaction, TTL expiry and iteration.
//!
//! ## How a Lookup Works
//!
//! ```text
//! key ──hasher──> h ──&mask──> home bucket
//!                                  │
//!                     linear probe ▼ (step = +1 & mask)
//!               ┌──────────────────────────────────┐
//!               │ offset == 0  → miss, stop        │
//!               │ offset  < 0  → tombstone, skip   │
//!               │ offset  > 0  → hash equal?       │
//!               │     └─ yes → compare key bytes   │
//!               │              in the log          │
//!               └──────────────────────────────────┘
//! ```
//!
//! Key bytes are encoded at most once per operation: eagerly on writes
//! (the scratch buffer is reused for every probe comparison), lazily on
//! reads (only when a candidate slot's hash matches).
//!
//! ## Update Discipline
//!
//! Updates never rewrite a record. The old record's flag flips to
//! DELETED, a fresh record is appended at the tail, and the slot is
//! repointed, so exactly one ACTIVE record exists per live key and a
//! failure at any single step leaves the table consistent. Dead bytes are
//! reclaimed by compaction or by the replay that accompanies any resize.
//!
//! ## Module Organization
//!
//! - [`engine`]: mutation and lookup protocol, resize, compaction
//! - [`iter`]: log-order iteration and the restartable scan cursor
//! - [`builder`]: fluent construction and configuration
//! - `entry`: record byte layout
//! - `index`: parallel hash/offset bucket arrays

mod builder;
mod engine;
mod entry;
mod index;
mod iter;

pub use builder::{MapBuilder, PersistOptions};
pub use iter::{Entries, Keys, ScanCursor, Values};

pub(crate) use entry::RecordLayout;
pub(crate) use index::BucketIndex;

use crate::cache::HotCache;
use crate::codec::{DefaultKeyHasher, TaggedCodec};
use crate::events::EventSink;
use crate::persist::PersistHandle;
use crate::storage::PagedBuf;

/// Auto-compaction policy. Compaction fires on mutating operations when
/// the table holds at least `min_size` entries (live + tombstones) and
/// tombstones make up more than `threshold` of them.
#[derive(Debug, Clone, Copy)]
pub struct CompactionPolicy {
    pub auto: bool,
    pub threshold: f64,
    pub min_size: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            auto: true,
            threshold: crate::config::DEFAULT_COMPACT_THRESHOLD,
            min_size: crate::config::DEFAULT_COMPACT_MIN_SIZE,
        }
    }
}

/// Embedded key-value map over a paged append-only log.
///
/// Keys and values live as packed bytes in the log; the only per-entry
/// heap cost is two machine words in the bucket index. The map is
/// single-threaded and non-reentrant: callers sharing one instance
/// serialize access externally, and event sinks must not call back in.
///
/// Construct through [`MapBuilder`].
pub struct RogueMap<K, V, KC = TaggedCodec, VC = TaggedCodec, H = DefaultKeyHasher> {
    pub(crate) index: BucketIndex,
    pub(crate) log: PagedBuf,
    pub(crate) layout: RecordLayout,
    pub(crate) write_offset: u64,
    pub(crate) live: usize,
    pub(crate) tombstones: usize,
    pub(crate) default_ttl: u64,
    pub(crate) min_log_bytes: usize,
    pub(crate) compaction: CompactionPolicy,
    pub(crate) key_codec: KC,
    pub(crate) value_codec: VC,
    pub(crate) hasher: H,
    pub(crate) clock: Box<dyn Fn() -> u64>,
    pub(crate) sinks: Vec<Box<dyn EventSink<K, V>>>,
    pub(crate) cache: Option<HotCache<V>>,
    pub(crate) persist: Option<PersistHandle>,
}
