//! # Key Hashing Capability
//!
//! A `KeyHasher<K>` maps keys to 32-bit hashes. The engine only requires
//! determinism and reasonable distribution; collision resolution is the
//! probe loop's job, so a pathological hasher degrades performance but
//! never correctness (the forced-collision tests rely on exactly that).
//!
//! ## Defaults
//!
//! `DefaultKeyHasher` covers the key shapes the crate ships codecs for:
//! FNV-1a over the bytes of strings, byte strings and tagged values, and a
//! 64→32-bit avalanche mix for integers. `FnHasher` wraps any closure for
//! per-map overrides.

use super::Value;

/// Hashing capability consumed by the map engine.
pub trait KeyHasher<K> {
    /// Deterministic 32-bit hash of `key`.
    fn hash_key(&self, key: &K) -> i32;
}

/// FNV-1a, 32-bit. Small keys dominate this workload and FNV beats
/// table-driven hashes on short inputs.
#[inline]
pub fn fnv1a32(bytes: &[u8]) -> i32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash as i32
}

/// Finalizer from splitmix64, truncated to 32 bits. Spreads sequential
/// integer keys across the whole bucket range.
#[inline]
fn mix64(mut x: u64) -> i32 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (x ^ (x >> 31)) as i32
}

/// Default hasher for the key types the crate ships codecs for.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyHasher;

impl KeyHasher<String> for DefaultKeyHasher {
    fn hash_key(&self, key: &String) -> i32 {
        fnv1a32(key.as_bytes())
    }
}

impl KeyHasher<Vec<u8>> for DefaultKeyHasher {
    fn hash_key(&self, key: &Vec<u8>) -> i32 {
        fnv1a32(key)
    }
}

impl KeyHasher<i64> for DefaultKeyHasher {
    fn hash_key(&self, key: &i64) -> i32 {
        mix64(*key as u64)
    }
}

impl KeyHasher<u64> for DefaultKeyHasher {
    fn hash_key(&self, key: &u64) -> i32 {
        mix64(*key)
    }
}

impl KeyHasher<Value> for DefaultKeyHasher {
    fn hash_key(&self, key: &Value) -> i32 {
        match key {
            Value::Null => 0,
            Value::Bool(b) => mix64(*b as u64 + 1),
            Value::Int(i) => mix64(*i as u64),
            Value::Float(f) => mix64(f.to_bits()),
            Value::Text(s) => fnv1a32(s.as_bytes()),
            Value::Blob(b) => fnv1a32(b),
        }
    }
}

/// Adapter turning any closure into a hasher, mainly for overrides and for
/// forcing collisions in tests.
#[derive(Debug, Clone, Copy)]
pub struct FnHasher<F>(pub F);

impl<K, F: Fn(&K) -> i32> KeyHasher<K> for FnHasher<F> {
    fn hash_key(&self, key: &K) -> i32 {
        (self.0)(key)
    }
}
