//! # RogueDB - Embedded Key-Value Store
//!
//! RogueDB is an embedded, in-process key-value map built to hold tens to
//! hundreds of millions of entries with near-zero per-entry heap
//! overhead. This Rust implementation prioritizes:
//!
//! - **Packed storage**: all keys and values live as raw bytes in one
//!   paged, append-only log; resident memory tracks packed entry bytes,
//!   not per-entry object headers
//! - **O(1) heap shape**: the whole map is a handful of allocations (the
//!   bucket arrays and the log pages), however many entries it holds
//! - **Bytes-in, bytes-out**: the engine never interprets key or value
//!   bytes; codecs are a pluggable capability
//!
//! ## Quick Start
//!
//! ```ignore
//! use roguedb::{MapBuilder, Value};
//!
//! let mut map = MapBuilder::new().build()?;
//!
//! map.set(Value::from("hello"), Value::from("world"))?;
//! assert_eq!(map.get(&Value::from("hello"))?, Some(Value::from("world")));
//!
//! let blob = map.serialize()?;        // self-describing snapshot
//! map.deserialize(&blob)?;            // and back
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Public API (RogueMap)         │
//! ├──────────────────────────────────────────┤
//! │  Codec / Hasher     │  Events │ HotCache │
//! ├─────────────────────┴──────────┬─────────┤
//! │     Map Engine (probe loop,    │Snapshot │
//! │     resize, compaction, TTL)   │ Codec   │
//! ├────────────────────────────────┴─────────┤
//! │       Bucket Index  +  Record Layout     │
//! ├──────────────────────────────────────────┤
//! │        Paged Byte Storage (PagedBuf)     │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The bucket index is two parallel arrays (hash, signed offset); the
//! sign of an offset distinguishes live slots from tombstones. Records
//! are appended to the log and flipped dead in place; compaction and
//! resizes rewrite the log through one bulk-copy replay.
//!
//! ## Concurrency Model
//!
//! A map is single-threaded and non-reentrant. Nothing suspends inside a
//! table operation; persistence adapter calls happen strictly between
//! operations. Callers sharing a map across tasks serialize access
//! externally.
//!
//! ## Module Overview
//!
//! - [`map`]: the engine: probing, resize, compaction, iteration
//! - [`storage`]: paged byte region under the log
//! - [`codec`]: codec and hasher capabilities plus shipped impls
//! - [`snapshot`]: the `ROGUE` snapshot wire format
//! - [`persist`]: snapshot stores and the periodic save ticker
//! - [`events`]: mutation observers
//! - `cache`: optional hot-item cache

mod cache;
pub mod codec;
pub mod config;
pub mod events;
pub mod map;
pub mod persist;
pub mod snapshot;
pub mod storage;

pub use codec::{
    BytesCodec, Codec, DefaultKeyHasher, FnHasher, I64Codec, KeyHasher, StrCodec, TaggedCodec,
    Value,
};
pub use events::{EventSink, NullSink};
pub use map::{
    CompactionPolicy, Entries, Keys, MapBuilder, PersistOptions, RogueMap, ScanCursor, Values,
};
pub use persist::{FileStore, MemoryStore, SnapshotStore, StoreKind};

/// Current version of RogueDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
