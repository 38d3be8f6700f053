//! # Bucket Index
//!
//! Two parallel arrays sized to the bucket count: the 32-bit hash of each
//! occupied slot and a signed 64-bit log offset encoding the slot state.
//!
//! ## Slot States
//!
//! ```text
//! offset == 0   empty      (log offset 0 is reserved for exactly this)
//! offset  > 0   active     record begins at `offset`, flag is ACTIVE
//! offset  < 0   tombstone  |offset| points at a DELETED record; probing
//!                          walks past it, inserts may reuse the slot
//! ```
//!
//! Using the offset's sign for the third state avoids a separate state
//! array: a slot is one i32 + one i64, nothing else. The hash array is
//! only meaningful for non-empty slots and lets the probe loop reject
//! most mismatches without touching the log.
//!
//! Bucket counts are powers of two so the probe step is a mask, not a
//! modulo.

#[derive(Debug)]
pub(crate) struct BucketIndex {
    hashes: Box<[i32]>,
    offsets: Box<[i64]>,
    mask: usize,
}

impl BucketIndex {
    /// Allocates an empty index. `capacity` must be a power of two >= 2.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= 2,
            "bucket count {capacity} is not a power of two >= 2"
        );
        Self {
            hashes: vec![0; capacity].into_boxed_slice(),
            offsets: vec![0; capacity].into_boxed_slice(),
            mask: capacity - 1,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn mask(&self) -> usize {
        self.mask
    }

    /// Home bucket for a hash. The cast through u32 keeps negative hashes
    /// in range.
    #[inline]
    pub fn bucket_of(&self, hash: i32) -> usize {
        (hash as u32 as usize) & self.mask
    }

    #[inline]
    pub fn hash_at(&self, slot: usize) -> i32 {
        self.hashes[slot]
    }

    #[inline]
    pub fn offset_at(&self, slot: usize) -> i64 {
        self.offsets[slot]
    }

    #[inline]
    pub fn set(&mut self, slot: usize, hash: i32, offset: i64) {
        self.hashes[slot] = hash;
        self.offsets[slot] = offset;
    }

    #[inline]
    pub fn set_offset(&mut self, slot: usize, offset: i64) {
        self.offsets[slot] = offset;
    }

    /// Linear probe from the hash's home bucket to the first empty slot.
    /// Only valid while the index has at least one empty slot, which the
    /// load-factor bound guarantees.
    pub fn find_empty(&self, hash: i32) -> usize {
        let mut slot = self.bucket_of(hash);
        while self.offsets[slot] != 0 {
            slot = (slot + 1) & self.mask;
        }
        slot
    }

    /// Resets every slot to empty.
    pub fn clear(&mut self) {
        self.hashes.fill(0);
        self.offsets.fill(0);
    }
}
