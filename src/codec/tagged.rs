//! # Tagged Value Codec
//!
//! The default codec when a map is built without an explicit one. `Value`
//! covers the scalar shapes an embedded store meets in practice; the codec
//! prefixes each payload with a one-byte tag so the bytes are
//! self-describing.
//!
//! ## Encoding
//!
//! ```text
//! Tag  Payload
//! ---  -----------------------------
//! 0    (none)              Null
//! 1    (none)              Bool(false)
//! 2    (none)              Bool(true)
//! 3    8 bytes i64 LE      Int
//! 4    8 bytes f64 LE bits Float
//! 5    UTF-8 bytes         Text
//! 6    raw bytes           Blob
//! ```
//!
//! Text and Blob carry no internal length: the record's length prefix
//! already bounds the payload, so the codec reads to the end of its slice.
//!
//! Structured application types belong in a purpose-built `Codec`
//! implementation, not in this taxonomy; `Text` is the textual fallback
//! for anything else.

use eyre::{bail, ensure, Result};

use super::Codec;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_TEXT: u8 = 5;
const TAG_BLOB: u8 = 6;

/// Scalar value stored by the default codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

/// Self-describing codec over [`Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggedCodec;

impl Codec<Value> for TaggedCodec {
    fn encoded_len(&self, value: &Value) -> usize {
        1 + match value {
            Value::Null | Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 8,
            Value::Text(s) => s.len(),
            Value::Blob(b) => b.len(),
        }
    }

    fn encode(&self, value: &Value, dst: &mut [u8]) -> usize {
        match value {
            Value::Null => {
                dst[0] = TAG_NULL;
                1
            }
            Value::Bool(b) => {
                dst[0] = if *b { TAG_TRUE } else { TAG_FALSE };
                1
            }
            Value::Int(i) => {
                dst[0] = TAG_INT;
                dst[1..9].copy_from_slice(&i.to_le_bytes());
                9
            }
            Value::Float(f) => {
                dst[0] = TAG_FLOAT;
                dst[1..9].copy_from_slice(&f.to_bits().to_le_bytes());
                9
            }
            Value::Text(s) => {
                dst[0] = TAG_TEXT;
                dst[1..1 + s.len()].copy_from_slice(s.as_bytes());
                1 + s.len()
            }
            Value::Blob(b) => {
                dst[0] = TAG_BLOB;
                dst[1..1 + b.len()].copy_from_slice(b);
                1 + b.len()
            }
        }
    }

    fn decode(&self, src: &[u8]) -> Result<Value> {
        ensure!(!src.is_empty(), "empty buffer for tagged value");
        let payload = &src[1..];
        Ok(match src[0] {
            TAG_NULL => Value::Null,
            TAG_FALSE => Value::Bool(false),
            TAG_TRUE => Value::Bool(true),
            TAG_INT => {
                ensure!(payload.len() == 8, "int payload is {} bytes", payload.len());
                Value::Int(i64::from_le_bytes(payload.try_into().unwrap()))
            }
            TAG_FLOAT => {
                ensure!(payload.len() == 8, "float payload is {} bytes", payload.len());
                Value::Float(f64::from_bits(u64::from_le_bytes(payload.try_into().unwrap())))
            }
            TAG_TEXT => Value::Text(std::str::from_utf8(payload)?.to_string()),
            TAG_BLOB => Value::Blob(payload.to_vec()),
            tag => bail!("unknown value tag: {tag}"),
        })
    }
}
