//! # Engine Scenario Tests
//!
//! End-to-end coverage of the map engine through its public API:
//!
//! - basic set/get/has/delete and typed codecs
//! - forced hash collisions and tombstone walks
//! - tombstone reuse under set/delete churn
//! - TTL expiry with a stepped test clock, including event counts
//! - resize correctness from deliberately tiny tables
//! - compaction, clear, and the load-factor bound
//! - the hot cache and event ordering
//!
//! If any test fails after making changes, it indicates a regression.
//! Do NOT modify expected values to make tests pass - fix the underlying
//! issue.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use eyre::Result;
use roguedb::{
    Codec, CompactionPolicy, EventSink, FnHasher, I64Codec, MapBuilder, RogueMap, ScanCursor,
    StrCodec, Value,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Set(String),
    Delete(String),
    Expire(String),
    Evict(String),
    Clear,
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<Event>>>);

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    fn count(&self, wanted: &Event) -> usize {
        self.0.borrow().iter().filter(|e| *e == wanted).count()
    }
}

impl EventSink<String, String> for Recorder {
    fn on_set(&mut self, key: &String, _value: &String) {
        self.0.borrow_mut().push(Event::Set(key.clone()));
    }

    fn on_delete(&mut self, key: &String) {
        self.0.borrow_mut().push(Event::Delete(key.clone()));
    }

    fn on_expire(&mut self, key: &String) {
        self.0.borrow_mut().push(Event::Expire(key.clone()));
    }

    fn on_evict(&mut self, key: &String, _value: &String) {
        self.0.borrow_mut().push(Event::Evict(key.clone()));
    }

    fn on_clear(&mut self) {
        self.0.borrow_mut().push(Event::Clear);
    }
}

impl EventSink<String, i64> for Recorder {
    fn on_set(&mut self, key: &String, _value: &i64) {
        self.0.borrow_mut().push(Event::Set(key.clone()));
    }

    fn on_delete(&mut self, key: &String) {
        self.0.borrow_mut().push(Event::Delete(key.clone()));
    }

    fn on_expire(&mut self, key: &String) {
        self.0.borrow_mut().push(Event::Expire(key.clone()));
    }

    fn on_evict(&mut self, key: &String, _value: &i64) {
        self.0.borrow_mut().push(Event::Evict(key.clone()));
    }

    fn on_clear(&mut self) {
        self.0.borrow_mut().push(Event::Clear);
    }
}

/// Stepped clock shared between a test and the map under test.
fn test_clock() -> (Arc<AtomicU64>, impl Fn() -> u64 + 'static) {
    let time = Arc::new(AtomicU64::new(0));
    let handle = Arc::clone(&time);
    (time, move || handle.load(Ordering::Relaxed))
}

fn str_map(buckets: usize, log_bytes: usize) -> RogueMap<String, String, StrCodec, StrCodec> {
    MapBuilder::new()
        .bucket_count(buckets)
        .log_bytes(log_bytes)
        .key_codec(StrCodec)
        .value_codec(StrCodec)
        .build()
        .unwrap()
}

mod basic {
    use super::*;

    #[test]
    fn set_get_and_miss() {
        let mut map: RogueMap<Value, Value> = MapBuilder::new().build().unwrap();

        map.set(Value::from("hello"), Value::from("world")).unwrap();
        map.set(Value::from("count"), Value::Int(123)).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::from("hello")).unwrap(), Some(Value::from("world")));
        assert_eq!(map.get(&Value::from("count")).unwrap(), Some(Value::Int(123)));
        assert_eq!(map.get(&Value::from("missing")).unwrap(), None);
    }

    #[test]
    fn update_replaces_value() {
        let mut map = str_map(16, 4096);
        map.set("k".into(), "one".into()).unwrap();
        map.set("k".into(), "two".into()).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"k".into()).unwrap(), Some("two".into()));
    }

    #[test]
    fn has_agrees_with_get() {
        let mut map = str_map(16, 4096);
        map.set("present".into(), "v".into()).unwrap();

        for key in ["present", "absent", "also-absent"] {
            let key = key.to_string();
            let via_get = map.get(&key).unwrap().is_some();
            assert_eq!(map.has(&key).unwrap(), via_get);
        }
    }

    #[test]
    fn delete_then_reinsert() {
        let mut map = str_map(16, 4096);
        map.set("k".into(), "v".into()).unwrap();

        assert!(map.delete(&"k".into()).unwrap());
        assert!(!map.delete(&"k".into()).unwrap());
        assert_eq!(map.len(), 0);
        assert_eq!(map.get(&"k".into()).unwrap(), None);

        map.set("k".into(), "v2".into()).unwrap();
        assert_eq!(map.get(&"k".into()).unwrap(), Some("v2".into()));
    }

    /// Structured values go through a purpose-built codec; the engine
    /// only ever sees bytes.
    #[test]
    fn custom_value_codec() {
        #[derive(Debug, Clone, PartialEq)]
        struct Profile {
            bar: i64,
        }

        #[derive(Clone, Copy, Default)]
        struct ProfileCodec;

        impl Codec<Profile> for ProfileCodec {
            fn encoded_len(&self, _value: &Profile) -> usize {
                8
            }

            fn encode(&self, value: &Profile, dst: &mut [u8]) -> usize {
                dst[..8].copy_from_slice(&value.bar.to_le_bytes());
                8
            }

            fn decode(&self, src: &[u8]) -> Result<Profile> {
                eyre::ensure!(src.len() == 8, "profile payload is {} bytes", src.len());
                Ok(Profile { bar: i64::from_le_bytes(src.try_into().unwrap()) })
            }

            fn fixed_len(&self) -> Option<usize> {
                Some(8)
            }
        }

        let mut map: RogueMap<String, Profile, StrCodec, ProfileCodec> = MapBuilder::new()
            .key_codec(StrCodec)
            .value_codec(ProfileCodec)
            .build()
            .unwrap();

        map.set("foo".into(), Profile { bar: 123 }).unwrap();
        assert_eq!(map.get(&"foo".into()).unwrap(), Some(Profile { bar: 123 }));
    }
}

mod collisions {
    use super::*;

    fn colliding_map(buckets: usize) -> RogueMap<String, i64, StrCodec, I64Codec, FnHasher<fn(&String) -> i32>> {
        MapBuilder::new()
            .bucket_count(buckets)
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .hasher(FnHasher((|_| 1) as fn(&String) -> i32))
            .build()
            .unwrap()
    }

    #[test]
    fn all_keys_share_one_bucket() {
        let mut map = colliding_map(16);
        map.set("1".into(), 1).unwrap();
        map.set("2".into(), 2).unwrap();
        map.set("3".into(), 3).unwrap();

        assert!(map.delete(&"2".into()).unwrap());

        assert_eq!(map.get(&"1".into()).unwrap(), Some(1));
        assert_eq!(map.get(&"3".into()).unwrap(), Some(3));
        assert!(!map.has(&"2".into()).unwrap());

        map.set("2".into(), 20).unwrap();
        assert_eq!(map.get(&"2".into()).unwrap(), Some(20));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn probing_walks_past_tombstones() {
        let mut map = colliding_map(16);
        for i in 0..8i64 {
            map.set(format!("k{i}"), i).unwrap();
        }
        // Tombstone the middle of the chain, then verify the tail is
        // still reachable.
        for i in 2..5i64 {
            assert!(map.delete(&format!("k{i}")).unwrap());
        }
        for i in 5..8i64 {
            assert_eq!(map.get(&format!("k{i}")).unwrap(), Some(i));
        }
        assert_eq!(map.len(), 5);
    }
}

mod churn {
    use super::*;

    #[test]
    fn tombstone_reuse_under_pressure() {
        let mut map: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
            .bucket_count(10)
            .log_bytes(4096)
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .build()
            .unwrap();

        assert_eq!(map.bucket_count(), 16);
        for i in 0..1000i64 {
            map.set("t".into(), i).unwrap();
            assert!(map.delete(&"t".into()).unwrap());
        }

        assert_eq!(map.len(), 0);
        // the churn reuses the same slot, so the table never rehashed
        assert_eq!(map.bucket_count(), 16);
    }

    #[test]
    fn load_factor_bound_holds_after_every_set() {
        let mut map: RogueMap<String, i64, StrCodec, I64Codec, FnHasher<fn(&String) -> i32>> =
            MapBuilder::new()
                .bucket_count(4)
                .log_bytes(256)
                .key_codec(StrCodec)
                .value_codec(I64Codec)
                .hasher(FnHasher((|k| k.len() as i32) as fn(&String) -> i32))
                .build()
                .unwrap();

        for i in 0..200i64 {
            map.set(format!("key-{i}"), i).unwrap();
            if i % 3 == 0 {
                map.delete(&format!("key-{i}")).unwrap();
            }
            let loaded = map.len() + map.tombstone_count();
            assert!(
                4 * loaded <= 3 * map.bucket_count(),
                "load factor exceeded: {} entries in {} buckets",
                loaded,
                map.bucket_count()
            );
        }
    }
}

mod ttl {
    use super::*;

    #[test]
    fn entries_expire_after_deadline() {
        let (time, clock) = test_clock();
        let recorder = Recorder::default();
        let mut map: RogueMap<String, String, StrCodec, StrCodec> = MapBuilder::new()
            .bucket_count(16)
            .key_codec(StrCodec)
            .value_codec(StrCodec)
            .ttl(1000)
            .clock(clock)
            .build()
            .unwrap();
        map.subscribe(Box::new(recorder.clone()));

        map.set("k1".into(), "v1".into()).unwrap();

        time.store(500, Ordering::Relaxed);
        assert_eq!(map.get(&"k1".into()).unwrap(), Some("v1".into()));

        time.store(1001, Ordering::Relaxed);
        assert_eq!(map.get(&"k1".into()).unwrap(), None);
        assert_eq!(map.len(), 0);

        // the expire event fired exactly once; later observations are
        // plain misses
        assert_eq!(map.get(&"k1".into()).unwrap(), None);
        assert!(!map.delete(&"k1".into()).unwrap());
        assert_eq!(recorder.count(&Event::Expire("k1".into())), 1);
    }

    #[test]
    fn explicit_zero_ttl_never_expires() {
        let (time, clock) = test_clock();
        let mut map: RogueMap<String, String, StrCodec, StrCodec> = MapBuilder::new()
            .key_codec(StrCodec)
            .value_codec(StrCodec)
            .ttl(100)
            .clock(clock)
            .build()
            .unwrap();

        map.set_with_ttl("forever".into(), "v".into(), 0).unwrap();
        map.set("fleeting".into(), "v".into()).unwrap();

        time.store(1_000_000, Ordering::Relaxed);
        assert_eq!(map.get(&"forever".into()).unwrap(), Some("v".into()));
        assert_eq!(map.get(&"fleeting".into()).unwrap(), None);
    }

    #[test]
    fn delete_on_expired_entry_reports_absent() {
        let (time, clock) = test_clock();
        let recorder = Recorder::default();
        let mut map: RogueMap<String, String, StrCodec, StrCodec> = MapBuilder::new()
            .key_codec(StrCodec)
            .value_codec(StrCodec)
            .clock(clock)
            .build()
            .unwrap();
        map.subscribe(Box::new(recorder.clone()));

        map.set_with_ttl("k".into(), "v".into(), 10).unwrap();
        time.store(11, Ordering::Relaxed);

        assert!(!map.delete(&"k".into()).unwrap());
        assert_eq!(recorder.count(&Event::Expire("k".into())), 1);
        assert_eq!(recorder.count(&Event::Delete("k".into())), 0);
    }

    #[test]
    fn iteration_skips_expired_without_events() {
        let (time, clock) = test_clock();
        let recorder = Recorder::default();
        let mut map: RogueMap<String, String, StrCodec, StrCodec> = MapBuilder::new()
            .key_codec(StrCodec)
            .value_codec(StrCodec)
            .clock(clock)
            .build()
            .unwrap();
        map.subscribe(Box::new(recorder.clone()));

        map.set_with_ttl("short".into(), "v".into(), 10).unwrap();
        map.set("long".into(), "v".into()).unwrap();
        time.store(11, Ordering::Relaxed);

        let keys: Vec<String> = map.keys().map(|k| k.unwrap()).collect();
        assert_eq!(keys, vec!["long".to_string()]);
        assert_eq!(recorder.count(&Event::Expire("short".into())), 0);
    }
}

mod resize {
    use super::*;

    #[test]
    fn tiny_table_grows_through_twenty_inserts() {
        let mut map = str_map(4, 64);
        for i in 0..20 {
            map.set(format!("k{i}"), format!("v{i}")).unwrap();
        }

        assert_eq!(map.len(), 20);
        for i in 0..20 {
            assert_eq!(map.get(&format!("k{i}")).unwrap(), Some(format!("v{i}")));
        }
        assert!(map.bucket_count().is_power_of_two());
        assert!(map.bucket_count() >= 32);
    }

    #[test]
    fn oversized_record_grows_the_log() {
        let mut map = str_map(16, 64);
        let big = "x".repeat(200);
        map.set("big".into(), big.clone()).unwrap();
        assert_eq!(map.get(&"big".into()).unwrap(), Some(big));
        assert!(map.log_bytes() >= 256);
    }
}

mod compaction {
    use super::*;

    #[test]
    fn compact_preserves_observable_state() {
        let mut map = str_map(64, 4096);
        for i in 0..40 {
            map.set(format!("k{i}"), format!("v{i}")).unwrap();
        }
        for i in 0..10 {
            map.delete(&format!("k{i}")).unwrap();
        }

        let before = map.log_bytes();
        map.compact().unwrap();

        assert_eq!(map.len(), 30);
        assert_eq!(map.tombstone_count(), 0);
        assert!(map.log_bytes() <= before);
        for i in 10..40 {
            assert_eq!(map.get(&format!("k{i}")).unwrap(), Some(format!("v{i}")));
        }
    }

    #[test]
    fn compact_is_idempotent() {
        let mut map = str_map(64, 4096);
        for i in 0..30 {
            map.set(format!("k{i}"), format!("v{i}")).unwrap();
        }
        for i in 0..15 {
            map.delete(&format!("k{i}")).unwrap();
        }

        map.compact().unwrap();
        let len_once = map.len();
        let log_once = map.log_bytes();
        let entries_once: Vec<(String, String)> =
            map.entries().map(|e| e.unwrap()).collect();

        map.compact().unwrap();
        let entries_twice: Vec<(String, String)> =
            map.entries().map(|e| e.unwrap()).collect();

        assert_eq!(map.len(), len_once);
        assert_eq!(map.log_bytes(), log_once);
        assert_eq!(entries_once, entries_twice);
    }

    #[test]
    fn compact_sweeps_expired_entries_with_events() {
        let (time, clock) = test_clock();
        let recorder = Recorder::default();
        let mut map: RogueMap<String, String, StrCodec, StrCodec> = MapBuilder::new()
            .key_codec(StrCodec)
            .value_codec(StrCodec)
            .clock(clock)
            .build()
            .unwrap();
        map.subscribe(Box::new(recorder.clone()));

        map.set_with_ttl("gone".into(), "v".into(), 5).unwrap();
        map.set("kept".into(), "v".into()).unwrap();
        time.store(100, Ordering::Relaxed);

        map.compact().unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(recorder.count(&Event::Expire("gone".into())), 1);
        assert_eq!(map.get(&"kept".into()).unwrap(), Some("v".into()));
    }

    #[test]
    fn auto_compaction_fires_on_tombstone_share() {
        let policy = CompactionPolicy { auto: true, threshold: 0.3, min_size: 100 };
        let mut map: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
            .bucket_count(1024)
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .compaction(policy)
            .build()
            .unwrap();

        for i in 0..200i64 {
            map.set(format!("k{i}"), i).unwrap();
        }
        for i in 0..70i64 {
            map.delete(&format!("k{i}")).unwrap();
        }

        // 130 live + 70 tombstones would be well over the 0.3 share; the
        // trigger compacts at the 61st delete (61/200 > 0.3), leaving
        // only the deletes issued after it as tombstones.
        assert_eq!(map.len(), 130);
        assert_eq!(map.tombstone_count(), 9);
    }
}

mod clearing {
    use super::*;

    #[test]
    fn clear_empties_and_reuses() {
        let recorder = Recorder::default();
        let mut map = str_map(16, 4096);
        map.subscribe(Box::new(recorder.clone()));

        map.set("a".into(), "1".into()).unwrap();
        map.set("b".into(), "2".into()).unwrap();
        map.clear();

        assert_eq!(map.len(), 0);
        assert_eq!(map.entries().count(), 0);
        assert_eq!(map.get(&"a".into()).unwrap(), None);
        assert_eq!(recorder.count(&Event::Clear), 1);

        map.set("a".into(), "again".into()).unwrap();
        assert_eq!(map.get(&"a".into()).unwrap(), Some("again".into()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut map = str_map(16, 4096);
        map.set("a".into(), "1".into()).unwrap();
        map.clear();
        map.clear();
        assert_eq!(map.len(), 0);
        assert_eq!(map.entries().count(), 0);
    }
}

mod iteration {
    use super::*;

    #[test]
    fn order_follows_most_recent_write() {
        let mut map = str_map(16, 4096);
        map.set("a".into(), "1".into()).unwrap();
        map.set("b".into(), "2".into()).unwrap();
        map.set("c".into(), "3".into()).unwrap();
        map.set("a".into(), "1b".into()).unwrap();

        let keys: Vec<String> = map.keys().map(|k| k.unwrap()).collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string(), "a".to_string()]);

        let values: Vec<String> = map.values().map(|v| v.unwrap()).collect();
        assert_eq!(values, vec!["2".to_string(), "3".to_string(), "1b".to_string()]);
    }

    #[test]
    fn entries_skip_deleted() {
        let mut map = str_map(16, 4096);
        for i in 0..6 {
            map.set(format!("k{i}"), format!("v{i}")).unwrap();
        }
        map.delete(&"k2".into()).unwrap();
        map.delete(&"k4".into()).unwrap();

        let pairs: Vec<(String, String)> = map.entries().map(|e| e.unwrap()).collect();
        assert_eq!(pairs.len(), 4);
        assert!(pairs.iter().all(|(k, _)| k != "k2" && k != "k4"));
    }

    #[test]
    fn scan_batches_are_restartable() {
        let mut map = str_map(32, 4096);
        for i in 0..10 {
            map.set(format!("k{i}"), format!("v{i}")).unwrap();
        }

        let mut cursor = ScanCursor::new();
        let mut seen = Vec::new();
        loop {
            let batch = map.scan_batch(&mut cursor, 3).unwrap();
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 3);
            seen.extend(batch);
        }
        assert_eq!(seen.len(), 10);

        // a fresh cursor replays from the head
        let mut again = ScanCursor::default();
        assert_eq!(map.scan_batch(&mut again, 100).unwrap().len(), 10);
    }
}

mod hot_cache {
    use super::*;

    #[test]
    fn cache_never_changes_results() {
        let mut cached: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
            .cache_size(4)
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .build()
            .unwrap();
        let mut plain: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .build()
            .unwrap();

        for i in 0..50i64 {
            let key = format!("k{}", i % 10);
            cached.set(key.clone(), i).unwrap();
            plain.set(key, i).unwrap();
        }
        for i in 0..10 {
            let key = format!("k{i}");
            assert_eq!(cached.get(&key).unwrap(), plain.get(&key).unwrap());
            // read twice: the second hit comes from the cache
            assert_eq!(cached.get(&key).unwrap(), plain.get(&key).unwrap());
        }

        cached.delete(&"k3".into()).unwrap();
        assert_eq!(cached.get(&"k3".into()).unwrap(), None);
    }

    #[test]
    fn evictions_emit_events() {
        let recorder = Recorder::default();
        let mut map: RogueMap<String, i64, StrCodec, I64Codec> = MapBuilder::new()
            .cache_size(2)
            .key_codec(StrCodec)
            .value_codec(I64Codec)
            .build()
            .unwrap();
        map.subscribe(Box::new(recorder.clone()));

        for i in 0..5i64 {
            map.set(format!("k{i}"), i).unwrap();
        }

        let evictions = recorder
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Evict(_)))
            .count();
        assert_eq!(evictions, 3);
    }

    #[test]
    fn expired_cache_entries_fall_through() {
        let (time, clock) = test_clock();
        let recorder = Recorder::default();
        let mut map: RogueMap<String, String, StrCodec, StrCodec> = MapBuilder::new()
            .cache_size(4)
            .key_codec(StrCodec)
            .value_codec(StrCodec)
            .clock(clock)
            .build()
            .unwrap();
        map.subscribe(Box::new(recorder.clone()));

        map.set_with_ttl("k".into(), "v".into(), 10).unwrap();
        assert_eq!(map.get(&"k".into()).unwrap(), Some("v".into()));

        time.store(11, Ordering::Relaxed);
        assert_eq!(map.get(&"k".into()).unwrap(), None);
        assert_eq!(recorder.count(&Event::Expire("k".into())), 1);
    }
}

mod events {
    use super::*;

    #[test]
    fn program_order_is_preserved() {
        let recorder = Recorder::default();
        let mut map = str_map(16, 4096);
        map.subscribe(Box::new(recorder.clone()));

        map.set("a".into(), "1".into()).unwrap();
        map.set("b".into(), "2".into()).unwrap();
        map.delete(&"a".into()).unwrap();
        map.clear();

        assert_eq!(
            recorder.events(),
            vec![
                Event::Set("a".into()),
                Event::Set("b".into()),
                Event::Delete("a".into()),
                Event::Clear,
            ]
        );
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let first = Recorder::default();
        let second = Recorder::default();
        let mut map = str_map(16, 4096);
        map.subscribe(Box::new(first.clone()));
        map.subscribe(Box::new(second.clone()));

        map.set("k".into(), "v".into()).unwrap();
        assert_eq!(first.events(), second.events());
        assert_eq!(first.count(&Event::Set("k".into())), 1);
    }
}
