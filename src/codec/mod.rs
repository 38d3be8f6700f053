//! # Codec Capability
//!
//! The engine never interprets key or value bytes. Everything it stores
//! goes through a `Codec<T>`: encode into a caller-provided slice, decode
//! from a slice, report the encoded length up front, and optionally declare
//! a fixed length so the engine can omit the per-record length prefix.
//!
//! ## Contract
//!
//! For every value `v`:
//!
//! - `encode(&v, dst)` writes exactly `encoded_len(&v)` bytes and returns
//!   that count; `dst` is guaranteed to be at least that long.
//! - `decode(&encoded)` returns a value observably equal to `v` (bytes
//!   round-trip bytes-for-bytes).
//! - If `fixed_len()` returns `Some(n)`, then `encoded_len` returns `n` for
//!   every value and the engine stores no length prefix for this side of
//!   the record. The declared length is part of the on-log format: changing
//!   it invalidates existing logs and snapshots.
//!
//! Codecs are plain values owned by the map; the engine is generic over
//! them so the hot probe loop monomorphizes and the calls inline.
//!
//! ## Module Organization
//!
//! - [`hasher`]: the `KeyHasher` capability and default hashers
//! - [`tagged`]: `Value` + `TaggedCodec`, the default self-describing codec
//! - [`scalar`]: `StrCodec`, `BytesCodec`, `I64Codec`

mod hasher;
mod scalar;
mod tagged;

pub use hasher::{DefaultKeyHasher, FnHasher, KeyHasher};
pub use scalar::{BytesCodec, I64Codec, StrCodec};
pub use tagged::{TaggedCodec, Value};

use eyre::Result;

/// Encoding capability consumed by the map engine.
pub trait Codec<T> {
    /// Encoded size of `value` in bytes.
    fn encoded_len(&self, value: &T) -> usize;

    /// Encodes `value` into the front of `dst`, returning the bytes
    /// written. `dst` is at least `encoded_len(value)` bytes.
    fn encode(&self, value: &T, dst: &mut [u8]) -> usize;

    /// Decodes a value from exactly the bytes produced by `encode`.
    fn decode(&self, src: &[u8]) -> Result<T>;

    /// Fixed encoded length, if every value of this type encodes to the
    /// same size. Declaring one drops the length prefix from each record.
    fn fixed_len(&self) -> Option<usize> {
        None
    }
}
