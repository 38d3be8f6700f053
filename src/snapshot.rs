//! # Snapshot Codec
//!
//! Serializes the whole map to a self-describing byte blob and restores
//! it. A snapshot is a point-in-time image, not a write-ahead log,
//! and promises nothing about writes in flight while it is taken (the
//! engine is single-threaded, so in practice it is taken between
//! operations).
//!
//! ## Wire Format (version 2, little-endian)
//!
//! ```text
//! Offset  Size         Field         Meaning
//! ------  -----------  ------------  --------------------------------
//! 0       5            magic         ASCII "ROGUE"
//! 5       1            version       2
//! 6       4            capacity      bucket count (power of two)
//! 10      4            live          live entry count
//! 14      4            write_offset  log tail
//! 18      4            log_len       log bytes that follow the buckets
//! 22      capacity*4   buckets       per bucket: |offset| as u32,
//!                                    0 = empty slot
//! ..      log_len      log           raw log bytes, from offset 0
//! ```
//!
//! The bucket words drop the offset's sign; restore recovers each slot's
//! state from the flag byte of the record it points at (ACTIVE → active,
//! DELETED → tombstone). The serialized log is the used prefix
//! `[0, write_offset)`; bytes past the tail carry no records.
//!
//! ## 4 GiB Limit
//!
//! Offsets travel as u32, so a log whose tail passed 4 GiB is not
//! representable; `encode_snapshot` refuses rather than truncate.
//!
//! ## Validation
//!
//! Restore validates magic, version, capacity shape, blob length and
//! every bucket word before any state is built, and returns an error
//! without partial effects on failure.

use eyre::{bail, ensure, Result};
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{FLAG_ACTIVE, FLAG_DELETED, LOG_ORIGIN, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
use crate::map::BucketIndex;
use crate::storage::PagedBuf;

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C, packed)]
struct SnapshotHeader {
    magic: [u8; 5],
    version: u8,
    capacity: U32,
    live: U32,
    write_offset: U32,
    log_len: U32,
}

const HEADER_SIZE: usize = size_of::<SnapshotHeader>();

const _: () = assert!(HEADER_SIZE == 22, "snapshot header layout drifted");

#[derive(Debug)]
pub(crate) struct SnapshotParts {
    pub index: BucketIndex,
    pub log: PagedBuf,
    pub write_offset: u64,
    pub live: usize,
}

pub(crate) fn encode_snapshot(
    index: &BucketIndex,
    log: &PagedBuf,
    write_offset: u64,
    live: usize,
) -> Result<Vec<u8>> {
    ensure!(
        write_offset <= u32::MAX as u64,
        "log tail {} exceeds the 4 GiB snapshot offset space",
        write_offset
    );
    let capacity = index.capacity();
    let log_len = write_offset as usize;

    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        version: SNAPSHOT_VERSION,
        capacity: U32::new(capacity as u32),
        live: U32::new(live as u32),
        write_offset: U32::new(write_offset as u32),
        log_len: U32::new(log_len as u32),
    };

    let mut blob = Vec::with_capacity(HEADER_SIZE + capacity * 4 + log_len);
    blob.extend_from_slice(header.as_bytes());
    for slot in 0..capacity {
        let word = index.offset_at(slot).unsigned_abs() as u32;
        blob.extend_from_slice(&word.to_le_bytes());
    }

    let log_start = blob.len();
    blob.resize(log_start + log_len, 0);
    log.read_bytes(0, &mut blob[log_start..]);
    Ok(blob)
}

/// Parses and validates a snapshot, building fresh index and log state.
/// `min_log_bytes` floors the restored log allocation so a near-empty
/// snapshot does not come back with a tiny log.
pub(crate) fn decode_snapshot(
    bytes: &[u8],
    page_size: usize,
    min_log_bytes: usize,
) -> Result<SnapshotParts> {
    ensure!(bytes.len() >= HEADER_SIZE, "snapshot truncated: {} bytes", bytes.len());
    let header = SnapshotHeader::ref_from_bytes(&bytes[..HEADER_SIZE])
        .map_err(|e| eyre::eyre!("failed to read snapshot header: {e:?}"))?;

    ensure!(
        header.magic == SNAPSHOT_MAGIC,
        "not a snapshot: bad magic {:?}",
        header.magic
    );
    ensure!(
        header.version == SNAPSHOT_VERSION,
        "unsupported snapshot version {} (expected {})",
        header.version,
        SNAPSHOT_VERSION
    );

    let capacity = header.capacity.get() as usize;
    let live = header.live.get() as usize;
    let write_offset = header.write_offset.get() as u64;
    let log_len = header.log_len.get() as usize;

    ensure!(
        capacity.is_power_of_two() && capacity >= 2,
        "snapshot bucket count {} is not a power of two >= 2",
        capacity
    );
    ensure!(
        write_offset as usize <= log_len,
        "snapshot log tail {} past its {} log bytes",
        write_offset,
        log_len
    );
    let expected = HEADER_SIZE + capacity * 4 + log_len;
    ensure!(
        bytes.len() == expected,
        "snapshot length {} does not match header ({} expected)",
        bytes.len(),
        expected
    );

    let mut log = PagedBuf::with_page_size(log_len.max(min_log_bytes), page_size);
    log.write_bytes(0, &bytes[HEADER_SIZE + capacity * 4..]);

    let mut index = BucketIndex::new(capacity);
    let words = &bytes[HEADER_SIZE..HEADER_SIZE + capacity * 4];
    for slot in 0..capacity {
        let word = u32::from_le_bytes(words[slot * 4..slot * 4 + 4].try_into().unwrap());
        if word == 0 {
            continue;
        }
        let offset = word as u64;
        ensure!(
            offset >= LOG_ORIGIN
                && offset + crate::config::RECORD_HEADER_SIZE as u64 <= write_offset,
            "snapshot bucket {} points at {}, outside the log",
            slot,
            offset
        );
        let flag = log.read_u8(offset);
        let hash = log.read_i32(offset + 1);
        match flag {
            FLAG_ACTIVE => index.set(slot, hash, offset as i64),
            FLAG_DELETED => index.set(slot, hash, -(offset as i64)),
            other => bail!("snapshot bucket {} points at flag byte {}", slot, other),
        }
    }

    Ok(SnapshotParts { index, log, write_offset, live })
}
