//! # Entry Record Layout
//!
//! Every key-value pair is one variable-length record appended to the log.
//! This module owns the byte layout; the engine only speaks in terms of
//! `RecordLayout` accessors.
//!
//! ## Binary Layout (little-endian)
//!
//! ```text
//! Offset  Size    Field     Notes
//! ------  ------  --------  ------------------------------------------
//! 0       1       flag      FLAG_ACTIVE (1) or FLAG_DELETED (2)
//! 1       4       hash      i32, key hash, duplicated from the index
//! 5       8       expire    u64 epoch-ms, 0 = never expires
//! 13      0 or 4  key_len   omitted when the key codec is fixed-length
//! ..      0 or 4  val_len   omitted when the value codec is fixed-length
//! ..      key_len key bytes
//! ..      val_len value bytes
//! ```
//!
//! The only in-place mutation ever applied to a record is flipping its
//! flag from ACTIVE to DELETED; bytes are otherwise immutable until
//! compaction rewrites the log.
//!
//! A `RecordLayout` captures which length prefixes exist for a given
//! codec pair. The prefixes are part of the on-log format: a snapshot
//! written with one codec pair must be restored with codecs declaring the
//! same fixed lengths.

use crate::config::{FLAG_ACTIVE, LEN_PREFIX_SIZE, RECORD_HEADER_SIZE};
use crate::storage::PagedBuf;

const HASH_AT: u64 = 1;
const EXPIRE_AT: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordLayout {
    fixed_key: Option<u32>,
    fixed_val: Option<u32>,
}

impl RecordLayout {
    pub fn new(fixed_key: Option<usize>, fixed_val: Option<usize>) -> Self {
        Self {
            fixed_key: fixed_key.map(|n| n as u32),
            fixed_val: fixed_val.map(|n| n as u32),
        }
    }

    /// Bytes before the key: header plus whichever length prefixes exist.
    #[inline]
    pub fn prefix_len(&self) -> usize {
        RECORD_HEADER_SIZE
            + if self.fixed_key.is_none() { LEN_PREFIX_SIZE } else { 0 }
            + if self.fixed_val.is_none() { LEN_PREFIX_SIZE } else { 0 }
    }

    /// Total record size for the given payload sizes.
    #[inline]
    pub fn record_len(&self, key_len: usize, val_len: usize) -> usize {
        self.prefix_len() + key_len + val_len
    }

    /// Writes a complete ACTIVE record at `offset`.
    pub fn write_record(
        &self,
        log: &mut PagedBuf,
        offset: u64,
        hash: i32,
        expire_at: u64,
        key: &[u8],
        val: &[u8],
    ) {
        log.write_u8(offset, FLAG_ACTIVE);
        log.write_i32(offset + HASH_AT, hash);
        log.write_u64(offset + EXPIRE_AT, expire_at);
        let mut cursor = offset + RECORD_HEADER_SIZE as u64;
        if self.fixed_key.is_none() {
            log.write_u32(cursor, key.len() as u32);
            cursor += LEN_PREFIX_SIZE as u64;
        }
        if self.fixed_val.is_none() {
            log.write_u32(cursor, val.len() as u32);
            cursor += LEN_PREFIX_SIZE as u64;
        }
        log.write_bytes(cursor, key);
        log.write_bytes(cursor + key.len() as u64, val);
    }

    #[inline]
    pub fn read_flag(&self, log: &PagedBuf, offset: u64) -> u8 {
        log.read_u8(offset)
    }

    /// Flips a record to DELETED in place.
    #[inline]
    pub fn mark_deleted(&self, log: &mut PagedBuf, offset: u64) {
        log.write_u8(offset, crate::config::FLAG_DELETED);
    }

    #[inline]
    pub fn read_hash(&self, log: &PagedBuf, offset: u64) -> i32 {
        log.read_i32(offset + HASH_AT)
    }

    #[inline]
    pub fn read_expire(&self, log: &PagedBuf, offset: u64) -> u64 {
        log.read_u64(offset + EXPIRE_AT)
    }

    #[inline]
    pub fn key_len(&self, log: &PagedBuf, offset: u64) -> usize {
        match self.fixed_key {
            Some(n) => n as usize,
            None => log.read_u32(offset + RECORD_HEADER_SIZE as u64) as usize,
        }
    }

    #[inline]
    pub fn val_len(&self, log: &PagedBuf, offset: u64) -> usize {
        match self.fixed_val {
            Some(n) => n as usize,
            None => {
                let at = offset
                    + RECORD_HEADER_SIZE as u64
                    + if self.fixed_key.is_none() { LEN_PREFIX_SIZE as u64 } else { 0 };
                log.read_u32(at) as usize
            }
        }
    }

    #[inline]
    pub fn key_offset(&self, offset: u64) -> u64 {
        offset + self.prefix_len() as u64
    }

    #[inline]
    pub fn val_offset(&self, offset: u64, key_len: usize) -> u64 {
        self.key_offset(offset) + key_len as u64
    }

    /// Full size of the record starting at `offset`, parsed from the log.
    #[inline]
    pub fn total_len(&self, log: &PagedBuf, offset: u64) -> u64 {
        self.record_len(self.key_len(log, offset), self.val_len(log, offset)) as u64
    }
}
