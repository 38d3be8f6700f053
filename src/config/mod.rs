//! # RogueDB Configuration Module
//!
//! This module centralizes all configuration constants for RogueDB. Constants
//! are grouped by their functional area and interdependencies are documented
//! and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The record layout, the snapshot wire format, and the resize policy all
//! depend on the same handful of numbers. Scattering them across modules
//! invites mismatches that corrupt the log silently; co-locating them with
//! compile-time checks keeps the format honest.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
