//! # Event Sinks
//!
//! Observers of map mutations. Sinks are registered with
//! [`RogueMap::subscribe`](crate::RogueMap::subscribe) and see every event
//! in program order: a `set` is reported after the record is indexed, a
//! `delete` after the slot is tombstoned, an `expire` when a lazy read or a
//! compaction sweep first observes an entry past its deadline, an `evict`
//! when the hot cache drops a decoded value, and a `clear` after the table
//! is reset.
//!
//! Iteration is a read-only observation and never emits `expire`, so an
//! expired entry fires its event exactly once, from whichever mutating or
//! probing path sees it first.
//!
//! Sinks run inline on the engine's thread. A slow sink slows the map; a
//! sink must not call back into the map (the engine is non-reentrant).

/// Callbacks for map lifecycle events. All methods default to no-ops so
/// implementations override only what they observe.
pub trait EventSink<K, V> {
    fn on_set(&mut self, _key: &K, _value: &V) {}
    fn on_delete(&mut self, _key: &K) {}
    fn on_expire(&mut self, _key: &K) {}
    fn on_evict(&mut self, _key: &K, _value: &V) {}
    fn on_clear(&mut self) {}
}

/// Sink that discards everything. Useful as a placeholder in benchmarks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<K, V> EventSink<K, V> for NullSink {}
