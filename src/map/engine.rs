//! # Engine Operations
//!
//! Mutation and lookup protocol for [`RogueMap`]: the probe loop, the
//! flip-then-append update discipline, lazy TTL expiry, the two resize
//! shapes, and compaction.
//!
//! ## Probe Protocol
//!
//! Pure linear probing (`next = (cur + 1) & mask`). The simplicity is
//! deliberate: tombstone walks stay cheap and every invariant is
//! preserved by elementary reasoning. Inserts remember the earliest
//! tombstone seen and reuse it when the key turns out to be absent, so
//! delete-heavy workloads do not stretch probe chains.
//!
//! ## Capacity Management
//!
//! Two triggers, two shapes:
//!
//! - Load factor: `(live + tombstones)` reaching 3/4 of the bucket count
//!   doubles both the bucket array and the log.
//! - Log full: an append that would pass the end of the log doubles the
//!   log alone, retried up to three times before surfacing an error.
//!
//! Both shapes rebuild through the same replay: walk the old log, bulk
//! copy each ACTIVE record (no decode), and reprobe its hash into the
//! fresh index. Replay drops DELETED records as a side effect, so every
//! resize is also a compaction.
//!
//! ## TTL
//!
//! Expiry is lazy. Reads that land on an expired record flip it to
//! DELETED on the spot, tombstone the slot, and report a miss; the
//! `expire` event fires exactly once per entry, from whichever path
//! observes the deadline first (a read, a delete, or the compaction
//! sweep). Iteration skips expired records without mutating anything.

use eyre::{bail, ensure, Result};
use smallvec::{smallvec, SmallVec};

use crate::codec::{Codec, KeyHasher};
use crate::config::{
    COMPACT_HEADROOM, FLAG_ACTIVE, INLINE_KEY_CMP_MAX, LOG_ORIGIN, MAX_APPEND_RETRIES,
    MAX_LOAD_DEN, MAX_LOAD_NUM,
};
use crate::events::EventSink;
use crate::snapshot;
use crate::storage::PagedBuf;

use super::{BucketIndex, RogueMap};

type KeyBuf = SmallVec<[u8; INLINE_KEY_CMP_MAX]>;

enum ReadOutcome {
    Miss,
    Expired,
    Found { slot: usize, rec_off: u64, key_buf: KeyBuf },
}

enum SetStep {
    Done,
    LogFull,
    TableFull,
}

impl<K, V, KC, VC, H> RogueMap<K, V, KC, VC, H>
where
    V: Clone,
    KC: Codec<K>,
    VC: Codec<V>,
    H: KeyHasher<K>,
{
    /// Number of live entries. Entries past their TTL are counted until
    /// some operation observes the deadline.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Current bucket count. Always a power of two.
    pub fn bucket_count(&self) -> usize {
        self.index.capacity()
    }

    /// Number of tombstoned slots awaiting reuse or compaction.
    pub fn tombstone_count(&self) -> usize {
        self.tombstones
    }

    /// Current log allocation in bytes.
    pub fn log_bytes(&self) -> usize {
        self.log.len()
    }

    /// Registers an observer for set/delete/expire/evict/clear events.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink<K, V>>) {
        self.sinks.push(sink);
    }

    /// Inserts or updates `key`, applying the map's default TTL.
    pub fn set(&mut self, key: K, value: V) -> Result<()> {
        self.set_inner(key, value, None)
    }

    /// Inserts or updates `key` with an explicit TTL in milliseconds.
    /// A TTL of zero means the entry never expires, overriding any
    /// default TTL configured on the map.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl_ms: u64) -> Result<()> {
        self.set_inner(key, value, Some(ttl_ms))
    }

    fn set_inner(&mut self, key: K, value: V, ttl: Option<u64>) -> Result<()> {
        let now = (self.clock)();
        let expire_at = match ttl {
            Some(0) => 0,
            Some(ms) => now + ms,
            None if self.default_ttl > 0 => now + self.default_ttl,
            None => 0,
        };

        if (self.live + self.tombstones + 1) * MAX_LOAD_DEN > self.index.capacity() * MAX_LOAD_NUM {
            self.grow_table()?;
        }

        let hash = self.hasher.hash_key(&key);
        let mut key_buf: KeyBuf = smallvec![0; self.key_codec.encoded_len(&key)];
        self.key_codec.encode(&key, &mut key_buf);
        let mut val_buf = vec![0u8; self.value_codec.encoded_len(&value)];
        self.value_codec.encode(&value, &mut val_buf);

        let mut growths = 0;
        loop {
            match self.try_set(hash, expire_at, &key_buf, &val_buf) {
                SetStep::Done => break,
                SetStep::LogFull => {
                    ensure!(
                        growths < MAX_APPEND_RETRIES,
                        "log capacity exhausted: {}-byte record does not fit after {} doublings",
                        self.layout.record_len(key_buf.len(), val_buf.len()),
                        growths
                    );
                    growths += 1;
                    self.grow_log()?;
                }
                SetStep::TableFull => self.grow_table()?,
            }
        }

        let evicted = self
            .cache
            .as_mut()
            .and_then(|c| c.put(&key_buf, value.clone(), expire_at));
        if let Some((ekey, evalue)) = evicted {
            self.emit_evict_raw(&ekey, &evalue);
        }

        self.emit_set(&key, &value);
        self.maybe_autocompact()?;
        self.maybe_autosave(now);
        Ok(())
    }

    /// One pass over the probe sequence. Checks that the appended record
    /// fits *before* mutating anything, so a full log leaves the table
    /// untouched and the caller can grow and retry.
    fn try_set(&mut self, hash: i32, expire_at: u64, key: &[u8], val: &[u8]) -> SetStep {
        let mask = self.index.mask();
        let start = self.index.bucket_of(hash);
        let total = self.layout.record_len(key.len(), val.len()) as u64;
        let fits = self.write_offset + total <= self.log.len() as u64;

        let mut slot = start;
        let mut reuse: Option<usize> = None;
        loop {
            let off = self.index.offset_at(slot);
            if off == 0 {
                if !fits {
                    return SetStep::LogFull;
                }
                let target = reuse.unwrap_or(slot);
                if self.index.offset_at(target) < 0 {
                    // saturating: restored snapshots carry tombstone slots
                    // the counter does not know about
                    self.tombstones = self.tombstones.saturating_sub(1);
                }
                let rec = self.append(hash, expire_at, key, val);
                self.index.set(target, hash, rec as i64);
                self.live += 1;
                return SetStep::Done;
            }
            if off < 0 {
                if reuse.is_none() {
                    reuse = Some(slot);
                }
            } else if self.index.hash_at(slot) == hash && self.key_matches(off as u64, key) {
                if !fits {
                    return SetStep::LogFull;
                }
                // flip-then-append keeps exactly one ACTIVE record per key
                self.layout.mark_deleted(&mut self.log, off as u64);
                let rec = self.append(hash, expire_at, key, val);
                self.index.set(slot, hash, rec as i64);
                return SetStep::Done;
            }
            slot = (slot + 1) & mask;
            if slot == start {
                let Some(target) = reuse else {
                    return SetStep::TableFull;
                };
                if !fits {
                    return SetStep::LogFull;
                }
                let rec = self.append(hash, expire_at, key, val);
                self.index.set(target, hash, rec as i64);
                self.tombstones = self.tombstones.saturating_sub(1);
                self.live += 1;
                return SetStep::Done;
            }
        }
    }

    /// Appends an ACTIVE record at the write cursor. The caller has
    /// already verified the record fits.
    fn append(&mut self, hash: i32, expire_at: u64, key: &[u8], val: &[u8]) -> u64 {
        let off = self.write_offset;
        self.layout
            .write_record(&mut self.log, off, hash, expire_at, key, val);
        self.write_offset += self.layout.record_len(key.len(), val.len()) as u64;
        off
    }

    /// Fetches the value for `key`, if present and not expired. An
    /// expired entry is deleted on observation and reported as absent.
    pub fn get(&mut self, key: &K) -> Result<Option<V>> {
        let now = (self.clock)();
        let hash = self.hasher.hash_key(key);

        let mut pre: Option<KeyBuf> = None;
        if self.cache.is_some() {
            let mut kb: KeyBuf = smallvec![0; self.key_codec.encoded_len(key)];
            self.key_codec.encode(key, &mut kb);
            if let Some((value, expire_at)) = self.cache.as_mut().unwrap().get(&kb) {
                if expire_at == 0 || now <= expire_at {
                    return Ok(Some(value));
                }
                // stale: drop it and let the probe apply expiry semantics
                self.cache.as_mut().unwrap().remove(&kb);
            }
            pre = Some(kb);
        }

        match self.probe_read(key, hash, now, pre) {
            ReadOutcome::Miss => Ok(None),
            ReadOutcome::Expired => {
                self.emit_expire(key);
                Ok(None)
            }
            ReadOutcome::Found { rec_off, key_buf, .. } => {
                let value = self.decode_value(rec_off)?;
                if self.cache.is_some() {
                    let expire_at = self.layout.read_expire(&self.log, rec_off);
                    let evicted = self
                        .cache
                        .as_mut()
                        .unwrap()
                        .put(&key_buf, value.clone(), expire_at);
                    if let Some((ekey, evalue)) = evicted {
                        self.emit_evict_raw(&ekey, &evalue);
                    }
                }
                Ok(Some(value))
            }
        }
    }

    /// Membership test with the same expiry side effects as [`get`],
    /// without decoding the value.
    ///
    /// [`get`]: RogueMap::get
    pub fn has(&mut self, key: &K) -> Result<bool> {
        let now = (self.clock)();
        let hash = self.hasher.hash_key(key);
        match self.probe_read(key, hash, now, None) {
            ReadOutcome::Miss => Ok(false),
            ReadOutcome::Expired => {
                self.emit_expire(key);
                Ok(false)
            }
            ReadOutcome::Found { .. } => Ok(true),
        }
    }

    /// Removes `key`. Returns false when absent; an entry found past its
    /// TTL is expired (with its event), not deleted, and also reports
    /// false.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        let now = (self.clock)();
        let hash = self.hasher.hash_key(key);
        match self.probe_read(key, hash, now, None) {
            ReadOutcome::Miss => Ok(false),
            ReadOutcome::Expired => {
                self.emit_expire(key);
                Ok(false)
            }
            ReadOutcome::Found { slot, rec_off, key_buf } => {
                self.layout.mark_deleted(&mut self.log, rec_off);
                self.index.set_offset(slot, -(rec_off as i64));
                self.live = self.live.saturating_sub(1);
                self.tombstones += 1;
                if let Some(cache) = &mut self.cache {
                    cache.remove(&key_buf);
                }
                self.emit_delete(key);
                self.maybe_autocompact()?;
                self.maybe_autosave(now);
                Ok(true)
            }
        }
    }

    /// Empties the map: zeroes the index, rewinds the write cursor and
    /// resets counters. The log allocation is kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.write_offset = LOG_ORIGIN;
        self.live = 0;
        self.tombstones = 0;
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
        self.emit_clear();
        let now = (self.clock)();
        self.maybe_autosave(now);
    }

    /// Shared read probe. Encodes the key at most once (lazily, unless
    /// `pre` already carries the bytes) and applies the lazy-expiry side
    /// effects in place; the caller only emits the event, since it holds
    /// the typed key.
    fn probe_read(&mut self, key: &K, hash: i32, now: u64, pre: Option<KeyBuf>) -> ReadOutcome {
        let mask = self.index.mask();
        let start = self.index.bucket_of(hash);
        let mut key_buf = pre;

        let mut slot = start;
        loop {
            let off = self.index.offset_at(slot);
            if off == 0 {
                return ReadOutcome::Miss;
            }
            if off > 0 && self.index.hash_at(slot) == hash {
                let buf = key_buf.get_or_insert_with(|| {
                    let mut kb: KeyBuf = smallvec![0; self.key_codec.encoded_len(key)];
                    self.key_codec.encode(key, &mut kb);
                    kb
                });
                let rec_off = off as u64;
                if self.key_matches(rec_off, buf) {
                    let expire_at = self.layout.read_expire(&self.log, rec_off);
                    if expire_at != 0 && now > expire_at {
                        self.layout.mark_deleted(&mut self.log, rec_off);
                        self.index.set_offset(slot, -off);
                        self.live = self.live.saturating_sub(1);
                        self.tombstones += 1;
                        let buf = key_buf.take().unwrap();
                        if let Some(cache) = &mut self.cache {
                            cache.remove(&buf);
                        }
                        return ReadOutcome::Expired;
                    }
                    return ReadOutcome::Found {
                        slot,
                        rec_off,
                        key_buf: key_buf.take().unwrap(),
                    };
                }
            }
            slot = (slot + 1) & mask;
            if slot == start {
                return ReadOutcome::Miss;
            }
        }
    }

    /// Compares the stored key at `rec_off` against encoded key bytes.
    /// A length mismatch is a miss, never an error, so a misbehaving
    /// codec can at worst fail to find its own entries.
    fn key_matches(&self, rec_off: u64, key: &[u8]) -> bool {
        if rec_off + self.layout.prefix_len() as u64 > self.log.len() as u64 {
            // only reachable through a corrupt snapshot
            return false;
        }
        if self.layout.key_len(&self.log, rec_off) != key.len() {
            return false;
        }
        let koff = self.layout.key_offset(rec_off);
        if koff + key.len() as u64 > self.log.len() as u64 {
            // only reachable through a corrupt snapshot; treat like any
            // other mismatch
            return false;
        }
        if key.len() < INLINE_KEY_CMP_MAX {
            for (i, &b) in key.iter().enumerate() {
                if self.log.read_u8(koff + i as u64) != b {
                    return false;
                }
            }
            true
        } else {
            self.log.range_eq(koff, key)
        }
    }

    fn decode_value(&self, rec_off: u64) -> Result<V> {
        let key_len = self.layout.key_len(&self.log, rec_off);
        let val_len = self.layout.val_len(&self.log, rec_off);
        let voff = self.layout.val_offset(rec_off, key_len);
        ensure!(
            voff + val_len as u64 <= self.log.len() as u64,
            "record at {} extends past the log",
            rec_off
        );
        match self.log.try_view(voff, val_len) {
            Some(view) => self.value_codec.decode(view),
            None => {
                let mut buf = vec![0u8; val_len];
                self.log.read_bytes(voff, &mut buf);
                self.value_codec.decode(&buf)
            }
        }
    }

    // ------------------------------------------------------------------
    // Resize and compaction
    // ------------------------------------------------------------------

    fn grow_table(&mut self) -> Result<()> {
        let new_capacity = self.index.capacity() * 2;
        let new_log_len = self.log.len() * 2;
        tracing::debug!(new_capacity, new_log_len, "load factor reached, growing table");
        self.rebuild(new_capacity, new_log_len)
    }

    fn grow_log(&mut self) -> Result<()> {
        let new_log_len = self.log.len() * 2;
        tracing::debug!(new_log_len, "log full, growing");
        self.rebuild(self.index.capacity(), new_log_len)
    }

    /// Reallocates the index and the log, then replays every ACTIVE
    /// record from the old log: one bulk byte move per record (no
    /// decode), reprobed into the new index. DELETED records are left
    /// behind, so the new log starts fully compacted.
    fn rebuild(&mut self, new_capacity: usize, new_log_len: usize) -> Result<()> {
        let layout = self.layout;
        let mut new_index = BucketIndex::new(new_capacity);
        let mut new_log = PagedBuf::with_page_size(new_log_len, self.log.page_size());
        let mut cursor = LOG_ORIGIN;
        let mut scratch: Vec<u8> = Vec::new();

        let mut old = LOG_ORIGIN;
        while old + layout.prefix_len() as u64 <= self.write_offset {
            let total = layout.total_len(&self.log, old);
            ensure!(
                old + total <= self.write_offset,
                "record at {} extends past the log tail {}",
                old,
                self.write_offset
            );
            if layout.read_flag(&self.log, old) == FLAG_ACTIVE {
                ensure!(
                    cursor + total <= new_log.len() as u64,
                    "replay overflow: {} bytes of live records exceed new log of {}",
                    cursor + total,
                    new_log.len()
                );
                scratch.resize(total as usize, 0);
                self.log.read_bytes(old, &mut scratch);
                new_log.write_bytes(cursor, &scratch);

                let hash = layout.read_hash(&self.log, old);
                let slot = new_index.find_empty(hash);
                new_index.set(slot, hash, cursor as i64);
                cursor += total;
            }
            old += total;
        }

        self.index = new_index;
        self.log = new_log;
        self.write_offset = cursor;
        self.tombstones = 0;
        Ok(())
    }

    /// Rewrites the log to hold only live records. Entries past their TTL
    /// are expired (with events) during the sweep; the new log is sized to
    /// the surviving bytes plus headroom, floored at the configured
    /// initial size.
    pub fn compact(&mut self) -> Result<()> {
        let now = (self.clock)();
        let layout = self.layout;
        let mut active_bytes: u64 = 0;

        let mut off = LOG_ORIGIN;
        while off + layout.prefix_len() as u64 <= self.write_offset {
            let total = layout.total_len(&self.log, off);
            ensure!(
                off + total <= self.write_offset,
                "record at {} extends past the log tail {}",
                off,
                self.write_offset
            );
            if layout.read_flag(&self.log, off) == FLAG_ACTIVE {
                let expire_at = layout.read_expire(&self.log, off);
                if expire_at != 0 && now > expire_at {
                    let key_len = layout.key_len(&self.log, off);
                    let mut key_bytes = vec![0u8; key_len];
                    self.log.read_bytes(layout.key_offset(off), &mut key_bytes);

                    layout.mark_deleted(&mut self.log, off);
                    self.live = self.live.saturating_sub(1);
                    if let Some(cache) = &mut self.cache {
                        cache.remove(&key_bytes);
                    }
                    match self.key_codec.decode(&key_bytes) {
                        Ok(key) => self.emit_expire(&key),
                        Err(err) => {
                            tracing::debug!(?err, "undecodable key in expiry sweep, event dropped")
                        }
                    }
                } else {
                    active_bytes += total;
                }
            }
            off += total;
        }

        let required = (LOG_ORIGIN + active_bytes) as f64 * COMPACT_HEADROOM;
        let new_log_len = (required.ceil() as usize).max(self.min_log_bytes);
        tracing::debug!(active_bytes, new_log_len, "compacting log");
        self.rebuild(self.index.capacity(), new_log_len)?;

        if self.persist.as_ref().is_some_and(|p| p.ticker.is_some()) {
            if let Err(err) = self.save() {
                tracing::warn!(?err, "post-compaction save failed");
            } else if let Some(handle) = &mut self.persist {
                if let Some(ticker) = &mut handle.ticker {
                    ticker.mark(now);
                }
            }
        }
        Ok(())
    }

    fn maybe_autocompact(&mut self) -> Result<()> {
        if !self.compaction.auto {
            return Ok(());
        }
        let total = self.live + self.tombstones;
        if total >= self.compaction.min_size
            && self.tombstones as f64 / total as f64 > self.compaction.threshold
        {
            tracing::debug!(
                live = self.live,
                tombstones = self.tombstones,
                "tombstone share over threshold, auto-compacting"
            );
            self.compact()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshots and persistence
    // ------------------------------------------------------------------

    /// Serializes the map to a self-describing snapshot blob.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        snapshot::encode_snapshot(&self.index, &self.log, self.write_offset, self.live)
    }

    /// Replaces the map's contents with a previously serialized snapshot.
    /// Codecs, hasher, sinks and configuration are untouched; the caller
    /// must restore with codecs declaring the same fixed lengths the
    /// snapshot was written with. Fails without touching state when the
    /// blob is not a valid snapshot.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        let parts = snapshot::decode_snapshot(bytes, self.log.page_size(), self.min_log_bytes)?;
        self.index = parts.index;
        self.log = parts.log;
        self.write_offset = parts.write_offset;
        self.live = parts.live;
        // Restored tombstone slots are not counted; deletes rebuild the
        // counter and the next compaction resets it.
        self.tombstones = 0;
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
        Ok(())
    }

    /// Saves a snapshot through the configured adapter.
    pub fn save(&self) -> Result<()> {
        let Some(handle) = &self.persist else {
            bail!("no persistence adapter configured");
        };
        let bytes = self.serialize()?;
        handle.store.save(&handle.key, &bytes)
    }

    /// Loads the stored snapshot, if any. Returns false when the adapter
    /// has nothing stored (a fresh map, not an error).
    pub fn load(&mut self) -> Result<bool> {
        let stored = {
            let Some(handle) = &self.persist else {
                bail!("no persistence adapter configured");
            };
            handle.store.load(&handle.key)?
        };
        match stored {
            Some(bytes) => {
                self.deserialize(&bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Final save (when persistence is configured) and stops the periodic
    /// save ticker. The map remains usable afterwards; further mutations
    /// are simply no longer auto-saved.
    pub fn close(&mut self) -> Result<()> {
        if self.persist.is_some() {
            self.save()?;
        }
        if let Some(handle) = &mut self.persist {
            handle.ticker = None;
        }
        Ok(())
    }

    fn maybe_autosave(&mut self, now: u64) {
        let due = match &mut self.persist {
            Some(handle) => match &mut handle.ticker {
                Some(ticker) if ticker.due(now) => {
                    ticker.mark(now);
                    true
                }
                _ => false,
            },
            None => false,
        };
        if due {
            if let Err(err) = self.save() {
                tracing::warn!(?err, "periodic snapshot save failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn emit_set(&mut self, key: &K, value: &V) {
        for sink in &mut self.sinks {
            sink.on_set(key, value);
        }
    }

    fn emit_delete(&mut self, key: &K) {
        for sink in &mut self.sinks {
            sink.on_delete(key);
        }
    }

    fn emit_expire(&mut self, key: &K) {
        for sink in &mut self.sinks {
            sink.on_expire(key);
        }
    }

    fn emit_clear(&mut self) {
        for sink in &mut self.sinks {
            sink.on_clear();
        }
    }

    /// Cache evictions hand back encoded key bytes; decode them so sinks
    /// see the typed key. Codec round-trip is part of the codec contract,
    /// so a failure here is logged and the event dropped.
    fn emit_evict_raw(&mut self, key_bytes: &[u8], value: &V) {
        match self.key_codec.decode(key_bytes) {
            Ok(key) => {
                for sink in &mut self.sinks {
                    sink.on_evict(&key, value);
                }
            }
            Err(err) => tracing::debug!(?err, "undecodable key in cache eviction, event dropped"),
        }
    }
}
