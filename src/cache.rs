//! # Hot-Item Cache
//!
//! A small bounded cache of decoded values in front of the log, keyed by
//! encoded key bytes. Entirely optional (`cache_size = 0` disables it) and
//! never observable through map semantics: a hit returns a clone of the
//! decoded value, a miss falls through to the probe path, and expiry is
//! re-checked on every hit so a stale cached entry can never outlive its
//! record.
//!
//! ## Why Second-Chance Eviction?
//!
//! Plain LRU thrashes under scan-like access: each newly decoded value
//! becomes most-recently-used and pushes out entries that are genuinely
//! hot. The second-chance (SIEVE) discipline keeps one `visited` bit per
//! slot and a clock hand:
//!
//! - On hit: set `visited`.
//! - On eviction: advance the hand, clearing `visited` flags, and evict
//!   the first slot found unvisited.
//!
//! Repeatedly-read entries survive the hand; one-shot reads are evicted
//! after a single lap. No ordering structure is maintained, so hits are a
//! hash lookup plus one bit store.
//!
//! ## Keying
//!
//! The cache keys on encoded key bytes rather than `K` so it imposes no
//! extra bounds on the key type; the engine already has the bytes in hand
//! when it consults the cache. Evictions hand the key bytes back to the
//! engine, which decodes them to fire the `evict` event.

use hashbrown::HashMap;

struct CacheSlot<V> {
    key: Box<[u8]>,
    value: V,
    expire_at: u64,
    visited: bool,
}

pub(crate) struct HotCache<V> {
    slots: Vec<CacheSlot<V>>,
    index: HashMap<Box<[u8]>, usize>,
    hand: usize,
    capacity: usize,
}

impl<V: Clone> HotCache<V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "use cache_size = 0 to disable the cache");
        Self {
            slots: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            hand: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Looks up a decoded value. Marks the slot visited on hit. Returns the
    /// stored expire-at alongside the value so the caller can re-check
    /// expiry against its own clock.
    pub fn get(&mut self, key: &[u8]) -> Option<(V, u64)> {
        let idx = *self.index.get(key)?;
        let slot = &mut self.slots[idx];
        slot.visited = true;
        Some((slot.value.clone(), slot.expire_at))
    }

    /// Inserts or refreshes an entry. Returns the evicted (key bytes,
    /// value) when the insert displaced a victim.
    pub fn put(&mut self, key: &[u8], value: V, expire_at: u64) -> Option<(Box<[u8]>, V)> {
        if let Some(&idx) = self.index.get(key) {
            let slot = &mut self.slots[idx];
            slot.value = value;
            slot.expire_at = expire_at;
            slot.visited = true;
            return None;
        }

        let mut evicted = None;
        if self.slots.len() == self.capacity {
            let victim = self.pick_victim();
            let old = std::mem::replace(
                &mut self.slots[victim],
                CacheSlot {
                    key: key.into(),
                    value,
                    expire_at,
                    visited: false,
                },
            );
            self.index.remove(&old.key);
            self.index.insert(key.into(), victim);
            evicted = Some((old.key, old.value));
        } else {
            self.slots.push(CacheSlot {
                key: key.into(),
                value,
                expire_at,
                visited: false,
            });
            self.index.insert(key.into(), self.slots.len() - 1);
        }
        evicted
    }

    /// Second-chance scan: clear visited flags until an unvisited slot is
    /// found. Terminates because a full lap clears every flag.
    fn pick_victim(&mut self) -> usize {
        loop {
            if self.hand >= self.slots.len() {
                self.hand = 0;
            }
            if self.slots[self.hand].visited {
                self.slots[self.hand].visited = false;
                self.hand += 1;
            } else {
                let victim = self.hand;
                self.hand += 1;
                return victim;
            }
        }
    }

    /// Drops the entry for `key`, if cached. Swap-removes to keep the slot
    /// vector dense, fixing up the index of the slot that moved.
    pub fn remove(&mut self, key: &[u8]) {
        let Some(idx) = self.index.remove(key) else {
            return;
        };
        self.slots.swap_remove(idx);
        if idx < self.slots.len() {
            let moved_key = self.slots[idx].key.clone();
            self.index.insert(moved_key, idx);
        }
        if self.hand > self.slots.len() {
            self.hand = 0;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.hand = 0;
    }
}
