//! # Storage Module
//!
//! This module provides the byte-level storage layer for RogueDB: a flat,
//! growable address space over fixed-size heap pages.
//!
//! ## Architecture Overview
//!
//! Everything the engine persists (entry records, their length prefixes,
//! key and value bytes) lives in one `PagedBuf` addressed by a flat
//! offset. The engine never sees pages; it reads and writes little-endian
//! primitives and byte ranges at offsets, and the buffer splits the access
//! at page boundaries when needed.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            Map Engine               │
//! │   (records addressed by offset)     │
//! ├─────────────────────────────────────┤
//! │             PagedBuf                │
//! │  (flat offsets → page + in-page)    │
//! ├────────────┬───────────┬────────────┤
//! │   page 0   │  page 1   │  page N    │
//! └────────────┴───────────┴────────────┘
//! ```
//!
//! ## Why Not One Allocation?
//!
//! The paged split keeps growth incremental (new pages are appended, old
//! pages are never moved) and keeps the address space friendly to hosts
//! that cap a single allocation. Buffers that fit one page take a fast
//! path that skips the page arithmetic entirely.
//!
//! ## Module Organization
//!
//! - [`paged`]: the `PagedBuf` primitive byte region

mod paged;

pub use paged::PagedBuf;
