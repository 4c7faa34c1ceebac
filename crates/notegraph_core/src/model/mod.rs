//! Domain model for notes, keywords and the keyword graph projection.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep the relational records and the graph projection shapes separate.
//!
//! # Invariants
//! - Every note, keyword and graph node is scoped to exactly one owner.
//! - Keyword names and note titles are unique per owner.

pub mod graph;
pub mod note;
