//! Text diff/patch helpers and the graph-sync skip decision.
//!
//! # Responsibility
//! - Compute character-level diffs between two note bodies.
//! - Produce and apply patch text for incremental note edits.
//! - Decide whether an incremental edit may skip graph resynchronization.
//!
//! # Invariants
//! - Concatenating `Equal`+`Delete` spans in order yields the old text;
//!   concatenating `Equal`+`Insert` spans yields the new text.
//! - Cursor positions count characters of the old text; inserts do not move it.
//! - Patch application is strict: a patch whose context does not match fails.

use crate::model::note::LinkInterval;
use similar::{ChangeTag, TextDiff};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Diff operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Equal,
    Insert,
    Delete,
}

/// One contiguous diff span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub op: DiffOp,
    pub text: String,
}

impl DiffSpan {
    pub fn new(op: DiffOp, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    /// Span length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Patch parsing or application failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchError {
    pub message: String,
}

impl Display for PatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "patch cannot be applied: {}", self.message)
    }
}

impl Error for PatchError {}

/// Computes a character-level diff with adjacent same-kind changes merged.
pub fn compute_diff(old_text: &str, new_text: &str) -> Vec<DiffSpan> {
    let diff = TextDiff::from_chars(old_text, new_text);
    let mut spans: Vec<DiffSpan> = Vec::new();
    for change in diff.iter_all_changes() {
        let op = match change.tag() {
            ChangeTag::Equal => DiffOp::Equal,
            ChangeTag::Insert => DiffOp::Insert,
            ChangeTag::Delete => DiffOp::Delete,
        };
        match spans.last_mut() {
            Some(last) if last.op == op => last.text.push_str(change.value()),
            _ => spans.push(DiffSpan::new(op, change.value())),
        }
    }
    spans
}

/// Builds patch text turning `old_text` into `new_text`.
pub fn make_patch_text(old_text: &str, new_text: &str) -> String {
    diffy::create_patch(old_text, new_text).to_string()
}

/// Applies `patch_text` to `old_text`.
///
/// # Errors
/// - Returns [`PatchError`] when the patch is malformed or its context does
///   not match `old_text`.
pub fn apply_patch(old_text: &str, patch_text: &str) -> Result<String, PatchError> {
    let patch = diffy::Patch::from_str(patch_text).map_err(|err| PatchError {
        message: err.to_string(),
    })?;
    diffy::apply(old_text, &patch).map_err(|err| PatchError {
        message: err.to_string(),
    })
}

/// Returns whether any diff span edits a protected interval of the old text.
///
/// - `Delete` over `[cursor, cursor + len)` touches an interval it overlaps.
/// - `Insert` at `cursor` touches an interval strictly containing `cursor`.
pub fn touches_protected_ranges(diffs: &[DiffSpan], protected: &[LinkInterval]) -> bool {
    let mut sorted = protected.to_vec();
    sorted.sort();

    let mut cursor = 0;
    for span in diffs {
        let len = span.char_len();
        match span.op {
            DiffOp::Equal => cursor += len,
            DiffOp::Delete => {
                let end = cursor + len;
                if sorted.iter().any(|interval| interval.overlaps(cursor, end)) {
                    return true;
                }
                cursor = end;
            }
            DiffOp::Insert => {
                if sorted
                    .iter()
                    .any(|interval| interval.strictly_contains(cursor))
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Returns whether any inserted span contains a bracket.
pub fn contains_new_link_markers(diffs: &[DiffSpan]) -> bool {
    diffs
        .iter()
        .any(|span| span.op == DiffOp::Insert && span.text.contains(['[', ']']))
}

/// Decides whether a text-only edit must resynchronize the graph.
///
/// Sync is skipped only when the note already tracked at least one link, the
/// edit arrived as an incremental patch, no tracked link span was touched and
/// no bracket was inserted.
pub fn graph_sync_required(
    previous_intervals: &[LinkInterval],
    incremental: bool,
    old_text: &str,
    new_text: &str,
) -> bool {
    if previous_intervals.is_empty() || !incremental {
        return true;
    }
    let diffs = compute_diff(old_text, new_text);
    touches_protected_ranges(&diffs, previous_intervals) || contains_new_link_markers(&diffs)
}
