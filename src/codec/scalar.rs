//! # Scalar Codecs
//!
//! Purpose-built codecs for maps whose key or value type is known up
//! front. They skip the tag byte of [`TaggedCodec`](super::TaggedCodec),
//! and `I64Codec` declares a fixed length so records for that side carry
//! no length prefix at all.

use eyre::{ensure, Result};

use super::Codec;

/// UTF-8 strings, stored as their raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrCodec;

impl Codec<String> for StrCodec {
    fn encoded_len(&self, value: &String) -> usize {
        value.len()
    }

    fn encode(&self, value: &String, dst: &mut [u8]) -> usize {
        dst[..value.len()].copy_from_slice(value.as_bytes());
        value.len()
    }

    fn decode(&self, src: &[u8]) -> Result<String> {
        Ok(std::str::from_utf8(src)?.to_string())
    }
}

/// Raw byte strings, stored verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encoded_len(&self, value: &Vec<u8>) -> usize {
        value.len()
    }

    fn encode(&self, value: &Vec<u8>, dst: &mut [u8]) -> usize {
        dst[..value.len()].copy_from_slice(value);
        value.len()
    }

    fn decode(&self, src: &[u8]) -> Result<Vec<u8>> {
        Ok(src.to_vec())
    }
}

/// Fixed-width signed 64-bit integers, little-endian. Declares a fixed
/// length, so records omit the length prefix for this side.
#[derive(Debug, Clone, Copy, Default)]
pub struct I64Codec;

impl Codec<i64> for I64Codec {
    fn encoded_len(&self, _value: &i64) -> usize {
        8
    }

    fn encode(&self, value: &i64, dst: &mut [u8]) -> usize {
        dst[..8].copy_from_slice(&value.to_le_bytes());
        8
    }

    fn decode(&self, src: &[u8]) -> Result<i64> {
        ensure!(src.len() == 8, "i64 payload is {} bytes, expected 8", src.len());
        Ok(i64::from_le_bytes(src.try_into().unwrap()))
    }

    fn fixed_len(&self) -> Option<usize> {
        Some(8)
    }
}
