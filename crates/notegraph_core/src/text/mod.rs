//! Pure text processing for note bodies.
//!
//! # Responsibility
//! - Extract wikilink targets and their character intervals.
//! - Diff/patch note bodies and decide when graph resync can be skipped.
//!
//! # Invariants
//! - Nothing in this module touches storage; every function is deterministic.

pub mod diff;
pub mod wikilink;
