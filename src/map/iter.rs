//! # Iteration
//!
//! Iteration is a linear scan of the log from the first record to the
//! write cursor. DELETED records are skipped; records past their TTL are
//! skipped too, but read-only: iteration never mutates the table and
//! never fires `expire` events. Because updates always append, the scan
//! yields each live key in the order of its most recent write.
//!
//! Three lazily-decoding flavors (`entries`, `keys`, `values`; the
//! single-half iterators decode only the half they yield) plus
//! [`ScanCursor`], a restartable batch cursor for embedding long scans in
//! cooperative schedulers: decode `n` entries, yield to the host, come
//! back with the same cursor. The cursor holds a plain log offset, so it
//! stays cheap and the protocol stays synchronous.
//!
//! Items are `Result`: decoding goes through the codecs and surfaces
//! their errors. A snapshot restored with mismatched codecs is the
//! typical way to hit one.

use eyre::Result;

use crate::codec::Codec;
use crate::config::{FLAG_ACTIVE, LOG_ORIGIN};
use crate::storage::PagedBuf;

use super::{RecordLayout, RogueMap};

fn decode_half<T, C: Codec<T>>(codec: &C, log: &PagedBuf, at: u64, len: usize) -> Result<T> {
    match log.try_view(at, len) {
        Some(view) => codec.decode(view),
        None => {
            let mut buf = vec![0u8; len];
            log.read_bytes(at, &mut buf);
            codec.decode(&buf)
        }
    }
}

/// Walks record boundaries, returning the offset of the next record that
/// is ACTIVE and unexpired, or None at the cursor.
fn next_live(
    layout: RecordLayout,
    log: &PagedBuf,
    write_offset: u64,
    now: u64,
    offset: &mut u64,
) -> Option<u64> {
    while *offset + layout.prefix_len() as u64 <= write_offset {
        let at = *offset;
        let total = layout.total_len(log, at);
        *offset += total;
        if at + total > write_offset {
            // truncated garbage tail, only reachable via a corrupt
            // snapshot; stop rather than read past the log
            return None;
        }
        if layout.read_flag(log, at) != FLAG_ACTIVE {
            continue;
        }
        let expire_at = layout.read_expire(log, at);
        if expire_at != 0 && now > expire_at {
            continue;
        }
        return Some(at);
    }
    None
}

/// Iterator over `(key, value)` pairs in most-recent-write order.
pub struct Entries<'a, K, V, KC, VC, H> {
    map: &'a RogueMap<K, V, KC, VC, H>,
    offset: u64,
    now: u64,
}

impl<K, V, KC: Codec<K>, VC: Codec<V>, H> Iterator for Entries<'_, K, V, KC, VC, H> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.map;
        let at = next_live(map.layout, &map.log, map.write_offset, self.now, &mut self.offset)?;
        let key_len = map.layout.key_len(&map.log, at);
        let val_len = map.layout.val_len(&map.log, at);
        let pair = decode_half(&map.key_codec, &map.log, map.layout.key_offset(at), key_len)
            .and_then(|k| {
                decode_half(
                    &map.value_codec,
                    &map.log,
                    map.layout.val_offset(at, key_len),
                    val_len,
                )
                .map(|v| (k, v))
            });
        Some(pair)
    }
}

/// Iterator over keys; value bytes are never decoded.
pub struct Keys<'a, K, V, KC, VC, H> {
    map: &'a RogueMap<K, V, KC, VC, H>,
    offset: u64,
    now: u64,
}

impl<K, V, KC: Codec<K>, VC, H> Iterator for Keys<'_, K, V, KC, VC, H> {
    type Item = Result<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.map;
        let at = next_live(map.layout, &map.log, map.write_offset, self.now, &mut self.offset)?;
        let key_len = map.layout.key_len(&map.log, at);
        Some(decode_half(
            &map.key_codec,
            &map.log,
            map.layout.key_offset(at),
            key_len,
        ))
    }
}

/// Iterator over values; key bytes are never decoded.
pub struct Values<'a, K, V, KC, VC, H> {
    map: &'a RogueMap<K, V, KC, VC, H>,
    offset: u64,
    now: u64,
}

impl<K, V, KC, VC: Codec<V>, H> Iterator for Values<'_, K, V, KC, VC, H> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let map = self.map;
        let at = next_live(map.layout, &map.log, map.write_offset, self.now, &mut self.offset)?;
        let key_len = map.layout.key_len(&map.log, at);
        let val_len = map.layout.val_len(&map.log, at);
        Some(decode_half(
            &map.value_codec,
            &map.log,
            map.layout.val_offset(at, key_len),
            val_len,
        ))
    }
}

/// Restartable position for batched scans. A fresh cursor starts at the
/// head of the log; [`RogueMap::scan_batch`] advances it.
#[derive(Debug, Clone, Copy)]
pub struct ScanCursor {
    pub(crate) offset: u64,
}

impl ScanCursor {
    pub fn new() -> Self {
        Self { offset: LOG_ORIGIN }
    }
}

impl Default for ScanCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, KC: Codec<K>, VC: Codec<V>, H> RogueMap<K, V, KC, VC, H> {
    /// Iterates `(key, value)` pairs. The expiry clock is sampled once at
    /// creation, so one pass observes a consistent point in time.
    pub fn entries(&self) -> Entries<'_, K, V, KC, VC, H> {
        Entries { map: self, offset: LOG_ORIGIN, now: (self.clock)() }
    }

    /// Iterates keys, decoding only key bytes.
    pub fn keys(&self) -> Keys<'_, K, V, KC, VC, H> {
        Keys { map: self, offset: LOG_ORIGIN, now: (self.clock)() }
    }

    /// Iterates values, decoding only value bytes.
    pub fn values(&self) -> Values<'_, K, V, KC, VC, H> {
        Values { map: self, offset: LOG_ORIGIN, now: (self.clock)() }
    }

    /// Decodes up to `max` live entries from `cursor`, advancing it. An
    /// empty batch means the scan is complete. Hosts with an event loop
    /// call this once per tick to keep long scans cooperative; mutating
    /// the map between batches invalidates the cursor.
    pub fn scan_batch(&self, cursor: &mut ScanCursor, max: usize) -> Result<Vec<(K, V)>> {
        let now = (self.clock)();
        let mut batch = Vec::with_capacity(max.min(64));
        while batch.len() < max {
            let Some(at) = next_live(self.layout, &self.log, self.write_offset, now, &mut cursor.offset)
            else {
                break;
            };
            let key_len = self.layout.key_len(&self.log, at);
            let val_len = self.layout.val_len(&self.log, at);
            let key = decode_half(&self.key_codec, &self.log, self.layout.key_offset(at), key_len)?;
            let value = decode_half(
                &self.value_codec,
                &self.log,
                self.layout.val_offset(at, key_len),
                val_len,
            )?;
            batch.push((key, value));
        }
        Ok(batch)
    }
}
