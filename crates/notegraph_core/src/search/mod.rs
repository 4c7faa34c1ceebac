//! Search entry points over the relational store.
//!
//! # Responsibility
//! - Expose title lookup and wikilink autocompletion queries.
//! - Keep search result shaping inside core.

pub mod title;
