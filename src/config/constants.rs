//! # RogueDB Configuration Constants
//!
//! This module centralizes all configuration constants, grouping
//! interdependent values together and documenting their relationships.
//! Constants that depend on each other are co-located to prevent mismatch
//! bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_PAGE_SIZE (2^30 bytes)
//!       │
//!       └─> Must be a power of two: PagedBuf computes page indices with
//!           shift/mask arithmetic. Enforced by a compile-time assertion.
//!
//! RECORD_HEADER_SIZE (13 bytes)
//!       │
//!       └─> Flag (1) + Hash (4) + ExpireAt (8). Length prefixes are NOT
//!           part of the fixed header; they are omitted per-codec when a
//!           fixed length is declared.
//!
//! LOG_ORIGIN (1)
//!       │
//!       └─> Offset 0 in the log is the "empty slot" sentinel in the bucket
//!           index. The first record always begins at offset 1, so the
//!           initial write cursor equals LOG_ORIGIN.
//!
//! MAX_LOAD_NUM / MAX_LOAD_DEN (3 / 4)
//!       │
//!       └─> The insert path grows the table when
//!           (live + tombstones) * MAX_LOAD_DEN >= buckets * MAX_LOAD_NUM.
//!           Bucket counts are powers of two, so the comparison never
//!           overflows for any realistic table size.
//!
//! DEFAULT_COMPACT_MIN_SIZE (1000) and DEFAULT_COMPACT_THRESHOLD (0.3)
//!       │
//!       └─> Auto-compaction fires when live + tombstones >= min size AND
//!           tombstones / (live + tombstones) > threshold.
//! ```
//!
//! ## Usage
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{FLAG_ACTIVE, RECORD_HEADER_SIZE};
//! ```

// ============================================================================
// ENTRY RECORD LAYOUT
// These define the on-log byte format and are frozen by the snapshot version
// ============================================================================

/// Flag byte of a live record.
pub const FLAG_ACTIVE: u8 = 1;

/// Flag byte of a dead record. Dead records are kept in the log so probe
/// sequences can walk past them; compaction reclaims the bytes.
pub const FLAG_DELETED: u8 = 2;

/// Fixed portion of every record: flag (1) + hash (4) + expire-at (8).
pub const RECORD_HEADER_SIZE: usize = 1 + 4 + 8;

/// Size of each optional length prefix (key length, value length).
pub const LEN_PREFIX_SIZE: usize = 4;

/// First valid record offset. Offset 0 is the empty-slot sentinel.
pub const LOG_ORIGIN: u64 = 1;

// ============================================================================
// PAGED STORAGE
// ============================================================================

/// Default page size for the paged log (1 GiB). Logs at or below this size
/// take the single-page fast path for every primitive operation.
pub const DEFAULT_PAGE_SIZE: usize = 1 << 30;

const _: () = assert!(
    DEFAULT_PAGE_SIZE.is_power_of_two(),
    "DEFAULT_PAGE_SIZE must be a power of two for shift/mask addressing"
);

// ============================================================================
// TABLE SIZING
// ============================================================================

/// Default number of buckets for a new map. Always rounded up to a power of
/// two; the minimum accepted value is MIN_BUCKET_COUNT.
pub const DEFAULT_BUCKET_COUNT: usize = 16384;

/// Smallest legal bucket count.
pub const MIN_BUCKET_COUNT: usize = 2;

/// Default initial log size in bytes (10 MiB).
pub const DEFAULT_LOG_BYTES: usize = 10 * 1024 * 1024;

/// Smallest legal log size. Must hold the reserved byte at offset 0 plus at
/// least one small record.
pub const MIN_LOG_BYTES: usize = 64;

/// Maximum load factor numerator/denominator (3/4). The insert path resizes
/// before (live + tombstones) / buckets can exceed this ratio.
pub const MAX_LOAD_NUM: usize = 3;
pub const MAX_LOAD_DEN: usize = 4;

/// How many times a single `set` retries after growing the log before the
/// append is surfaced as a fatal error.
pub const MAX_APPEND_RETRIES: usize = 3;

const _: () = assert!(
    DEFAULT_BUCKET_COUNT.is_power_of_two(),
    "DEFAULT_BUCKET_COUNT must be a power of two"
);

const _: () = assert!(MIN_BUCKET_COUNT >= 2, "bucket index needs at least 2 slots");

// ============================================================================
// KEY COMPARISON
// ============================================================================

/// Stored keys shorter than this are compared byte-by-byte in the probe
/// loop; longer keys use the paged buffer's bulk range_eq primitive. Both
/// paths yield identical results; the threshold is a tuning knob.
pub const INLINE_KEY_CMP_MAX: usize = 48;

// ============================================================================
// COMPACTION
// ============================================================================

/// Auto-compaction only considers tables with at least this many entries
/// (live + dead) so small maps never pay a rewrite.
pub const DEFAULT_COMPACT_MIN_SIZE: usize = 1000;

/// Dead-record share above which auto-compaction fires.
pub const DEFAULT_COMPACT_THRESHOLD: f64 = 0.3;

/// Headroom factor applied to the surviving bytes when sizing the
/// post-compaction log.
pub const COMPACT_HEADROOM: f64 = 1.2;

// ============================================================================
// SNAPSHOT FORMAT
// ============================================================================

/// Magic prefix of every snapshot blob.
pub const SNAPSHOT_MAGIC: [u8; 5] = *b"ROGUE";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 2;
