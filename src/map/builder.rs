//! # Map Builder
//!
//! Fluent construction for [`RogueMap`] with fine-grained control over
//! table sizing, codecs, hashing, TTL, compaction, caching and
//! persistence.
//!
//! ## Configuration Options
//!
//! | Option           | Default         | Description                                |
//! |------------------|-----------------|--------------------------------------------|
//! | bucket_count     | 16384           | Rounded up to a power of two               |
//! | log_bytes        | 10 MiB          | Initial log allocation                     |
//! | page_size        | 1 GiB           | Power of two; small values for tests       |
//! | ttl              | 0 (never)       | Default TTL applied by `set`               |
//! | cache_size       | 0 (disabled)    | Hot-cache capacity in entries              |
//! | compaction       | on, 0.3 / 1000  | Auto-compaction policy                     |
//! | persistence      | none            | Snapshot store + periodic save             |
//! | key/value codec  | `TaggedCodec`   | Swapping one changes the builder's type    |
//! | hasher           | `DefaultKeyHasher` | Any `KeyHasher<K>`                      |
//! | clock            | wall clock      | Override for deterministic TTL tests       |
//!
//! ## Usage
//!
//! ```ignore
//! let mut map: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
//!     .bucket_count(1024)
//!     .key_codec(StrCodec)
//!     .value_codec(I64Codec)
//!     .build()?;
//!
//! map.set("answer".into(), 42)?;
//! ```
//!
//! Swapping a codec or the hasher changes the builder's type parameters,
//! so mismatches between codec and key type are compile errors, not
//! runtime surprises.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::{bail, ensure, Result};

use crate::codec::{Codec, DefaultKeyHasher, KeyHasher, TaggedCodec};
use crate::config::{
    DEFAULT_BUCKET_COUNT, DEFAULT_LOG_BYTES, DEFAULT_PAGE_SIZE, LOG_ORIGIN, MIN_BUCKET_COUNT,
    MIN_LOG_BYTES,
};
use crate::cache::HotCache;
use crate::persist::{FileStore, MemoryStore, PersistHandle, SaveTicker, SnapshotStore, StoreKind};
use crate::storage::PagedBuf;

use super::{BucketIndex, CompactionPolicy, RecordLayout, RogueMap};

const SNAPSHOT_KEY: &str = "rogue.snapshot";

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Persistence configuration: which store, where, and how often to save.
#[derive(Debug, Clone)]
pub struct PersistOptions {
    pub kind: StoreKind,
    pub path: Option<PathBuf>,
    /// Periodic save interval in milliseconds; 0 disables the ticker.
    pub save_interval_ms: u64,
    /// Load any stored snapshot during `build()`.
    pub sync_load: bool,
}

impl PersistOptions {
    /// File-backed persistence rooted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: StoreKind::File,
            path: Some(path.into()),
            save_interval_ms: 0,
            sync_load: true,
        }
    }

    /// Process-local persistence, mainly for tests.
    pub fn memory() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: None,
            save_interval_ms: 0,
            sync_load: true,
        }
    }

    pub fn save_interval_ms(mut self, interval: u64) -> Self {
        self.save_interval_ms = interval;
        self
    }

    pub fn sync_load(mut self, load: bool) -> Self {
        self.sync_load = load;
        self
    }
}

/// Builder for [`RogueMap`]. See the module docs for the option table.
pub struct MapBuilder<KC = TaggedCodec, VC = TaggedCodec, H = DefaultKeyHasher> {
    bucket_count: usize,
    log_bytes: usize,
    page_size: usize,
    ttl_ms: u64,
    cache_size: usize,
    compaction: CompactionPolicy,
    persistence: Option<PersistOptions>,
    store_override: Option<Box<dyn SnapshotStore>>,
    clock: Option<Box<dyn Fn() -> u64>>,
    key_codec: KC,
    value_codec: VC,
    hasher: H,
}

impl MapBuilder {
    /// A builder with every option at its default.
    pub fn new() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            log_bytes: DEFAULT_LOG_BYTES,
            page_size: DEFAULT_PAGE_SIZE,
            ttl_ms: 0,
            cache_size: 0,
            compaction: CompactionPolicy::default(),
            persistence: None,
            store_override: None,
            clock: None,
            key_codec: TaggedCodec,
            value_codec: TaggedCodec,
            hasher: DefaultKeyHasher,
        }
    }
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<KC, VC, H> MapBuilder<KC, VC, H> {
    /// Initial bucket count, rounded up to a power of two on build.
    pub fn bucket_count(mut self, count: usize) -> Self {
        self.bucket_count = count;
        self
    }

    /// Initial log allocation in bytes.
    pub fn log_bytes(mut self, bytes: usize) -> Self {
        self.log_bytes = bytes;
        self
    }

    /// Page size for the paged log. Must be a power of two. Small values
    /// exist to exercise cross-page paths in tests.
    pub fn page_size(mut self, bytes: usize) -> Self {
        self.page_size = bytes;
        self
    }

    /// Default TTL in milliseconds applied by `set`; 0 disables expiry.
    pub fn ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Hot-cache capacity in entries; 0 disables the cache.
    pub fn cache_size(mut self, entries: usize) -> Self {
        self.cache_size = entries;
        self
    }

    pub fn compaction(mut self, policy: CompactionPolicy) -> Self {
        self.compaction = policy;
        self
    }

    pub fn persistence(mut self, options: PersistOptions) -> Self {
        self.persistence = Some(options);
        self
    }

    /// Installs a custom snapshot store, overriding the `kind`/`path` of
    /// any [`PersistOptions`] (whose interval and sync-load settings
    /// still apply).
    pub fn snapshot_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.store_override = Some(Box::new(store));
        self
    }

    /// Overrides the epoch-millisecond clock used for TTL and periodic
    /// saves. Tests install a stepped clock here.
    pub fn clock(mut self, clock: impl Fn() -> u64 + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Replaces the key codec, changing the builder's type accordingly.
    pub fn key_codec<KC2>(self, codec: KC2) -> MapBuilder<KC2, VC, H> {
        MapBuilder {
            bucket_count: self.bucket_count,
            log_bytes: self.log_bytes,
            page_size: self.page_size,
            ttl_ms: self.ttl_ms,
            cache_size: self.cache_size,
            compaction: self.compaction,
            persistence: self.persistence,
            store_override: self.store_override,
            clock: self.clock,
            key_codec: codec,
            value_codec: self.value_codec,
            hasher: self.hasher,
        }
    }

    /// Replaces the value codec, changing the builder's type accordingly.
    pub fn value_codec<VC2>(self, codec: VC2) -> MapBuilder<KC, VC2, H> {
        MapBuilder {
            bucket_count: self.bucket_count,
            log_bytes: self.log_bytes,
            page_size: self.page_size,
            ttl_ms: self.ttl_ms,
            cache_size: self.cache_size,
            compaction: self.compaction,
            persistence: self.persistence,
            store_override: self.store_override,
            clock: self.clock,
            key_codec: self.key_codec,
            value_codec: codec,
            hasher: self.hasher,
        }
    }

    /// Replaces the hasher, changing the builder's type accordingly.
    pub fn hasher<H2>(self, hasher: H2) -> MapBuilder<KC, VC, H2> {
        MapBuilder {
            bucket_count: self.bucket_count,
            log_bytes: self.log_bytes,
            page_size: self.page_size,
            ttl_ms: self.ttl_ms,
            cache_size: self.cache_size,
            compaction: self.compaction,
            persistence: self.persistence,
            store_override: self.store_override,
            clock: self.clock,
            key_codec: self.key_codec,
            value_codec: self.value_codec,
            hasher,
        }
    }

    pub fn get_bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn get_log_bytes(&self) -> usize {
        self.log_bytes
    }

    pub fn get_cache_size(&self) -> usize {
        self.cache_size
    }

    /// Validates the configuration and constructs the map. With
    /// persistence configured and `sync_load` set, any stored snapshot is
    /// loaded; a missing snapshot yields a fresh map.
    pub fn build<K, V>(self) -> Result<RogueMap<K, V, KC, VC, H>>
    where
        V: Clone,
        KC: Codec<K>,
        VC: Codec<V>,
        H: KeyHasher<K>,
    {
        ensure!(
            self.page_size.is_power_of_two(),
            "page size {} is not a power of two",
            self.page_size
        );
        ensure!(
            (0.0..=1.0).contains(&self.compaction.threshold),
            "compaction threshold {} is not within [0, 1]",
            self.compaction.threshold
        );

        let capacity = self
            .bucket_count
            .max(MIN_BUCKET_COUNT)
            .next_power_of_two();
        let log_bytes = self.log_bytes.max(MIN_LOG_BYTES);
        let clock = self.clock.unwrap_or_else(|| Box::new(wall_clock_ms));

        let sync_load = self.persistence.as_ref().is_some_and(|p| p.sync_load)
            || (self.persistence.is_none() && self.store_override.is_some());
        let persist = build_persist(self.persistence, self.store_override, &clock)?;

        let layout = RecordLayout::new(self.key_codec.fixed_len(), self.value_codec.fixed_len());
        let mut map = RogueMap {
            index: BucketIndex::new(capacity),
            log: PagedBuf::with_page_size(log_bytes, self.page_size),
            layout,
            write_offset: LOG_ORIGIN,
            live: 0,
            tombstones: 0,
            default_ttl: self.ttl_ms,
            min_log_bytes: log_bytes,
            compaction: self.compaction,
            key_codec: self.key_codec,
            value_codec: self.value_codec,
            hasher: self.hasher,
            clock,
            sinks: Vec::new(),
            cache: (self.cache_size > 0).then(|| HotCache::new(self.cache_size)),
            persist,
        };

        if map.persist.is_some() && sync_load {
            map.load()?;
        }
        Ok(map)
    }
}

fn build_persist(
    options: Option<PersistOptions>,
    store_override: Option<Box<dyn SnapshotStore>>,
    clock: &dyn Fn() -> u64,
) -> Result<Option<PersistHandle>> {
    let interval = options.as_ref().map_or(0, |o| o.save_interval_ms);
    let store: Box<dyn SnapshotStore> = match (store_override, options) {
        (Some(store), _) => store,
        (None, None) => return Ok(None),
        (None, Some(opts)) => match opts.kind {
            StoreKind::Memory => Box::new(MemoryStore::new()),
            StoreKind::File | StoreKind::Auto => {
                let Some(path) = opts.path else {
                    bail!("file persistence needs a path");
                };
                Box::new(FileStore::new(path))
            }
        },
    };
    let ticker = (interval > 0).then(|| SaveTicker::new(interval, clock()));
    Ok(Some(PersistHandle {
        store,
        key: SNAPSHOT_KEY.to_string(),
        ticker,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{I64Codec, StrCodec, Value};

    #[test]
    fn defaults_round_up_and_clamp() {
        let builder = MapBuilder::new().bucket_count(10).log_bytes(1);
        let map: RogueMap<Value, Value> = builder.build().unwrap();
        assert_eq!(map.bucket_count(), 16);
        assert_eq!(map.log_bytes(), MIN_LOG_BYTES);
    }

    #[test]
    fn builder_getters_report_settings() {
        let builder = MapBuilder::new().bucket_count(64).log_bytes(4096).cache_size(8);
        assert_eq!(builder.get_bucket_count(), 64);
        assert_eq!(builder.get_log_bytes(), 4096);
        assert_eq!(builder.get_cache_size(), 8);
    }

    #[test]
    fn codec_swap_produces_typed_map() {
        let mut map: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
            .bucket_count(8)
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .build()
            .unwrap();
        map.set("k".to_string(), 7).unwrap();
        assert_eq!(map.get(&"k".to_string()).unwrap(), Some(7));
    }

    #[test]
    fn non_power_of_two_page_size_is_rejected() {
        let result: Result<RogueMap<Value, Value>> =
            MapBuilder::new().page_size(1000).build();
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let policy = CompactionPolicy { auto: true, threshold: 1.5, min_size: 10 };
        let result: Result<RogueMap<Value, Value>> =
            MapBuilder::new().compaction(policy).build();
        assert!(result.is_err());
    }

    #[test]
    fn file_kind_without_path_is_rejected() {
        let mut opts = PersistOptions::memory();
        opts.kind = StoreKind::File;
        let result: Result<RogueMap<Value, Value>> =
            MapBuilder::new().persistence(opts).build();
        assert!(result.is_err());
    }
}
