//! Note and keyword domain model.
//!
//! # Responsibility
//! - Define the authoritative note/keyword records shared by repositories,
//!   the graph synchronizer and the lifecycle service.
//! - Define the per-field update values used by note updates.
//!
//! # Invariants
//! - `title` is non-empty and unique per owner once a note is persisted.
//! - `represents_keyword_id` is set iff the note is the canonical definition of
//!   that keyword; at most one note represents a given keyword.
//! - `link_intervals` are sorted by `start` and describe the persisted `text`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable note identifier.
pub type NoteId = Uuid;
/// Stable keyword identifier.
pub type KeywordId = Uuid;
/// Owner scope for every note, keyword and graph node.
pub type OwnerId = Uuid;

/// Half-open `[start, end)` character range of one literal `[[...]]` span.
///
/// Ordering compares `start` first, so sorted interval lists follow text order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkInterval {
    pub start: usize,
    pub end: usize,
}

impl LinkInterval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of characters covered by this interval.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether `[start, end)` overlaps this interval.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start.max(start) < self.end.min(end)
    }

    /// Returns whether `position` lies strictly inside this interval.
    pub fn strictly_contains(&self, position: usize) -> bool {
        self.start < position && position < self.end
    }
}

/// Authoritative note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub owner_id: OwnerId,
    pub title: String,
    /// Raw note body; `None` when the note has no text yet.
    pub text: Option<String>,
    /// Keyword this note canonically defines, if any.
    pub represents_keyword_id: Option<KeywordId>,
    /// Wikilink spans of `text`, kept as the baseline for incremental edits.
    pub link_intervals: Vec<LinkInterval>,
    /// Creation timestamp in epoch milliseconds.
    pub created_at: i64,
    /// Update timestamp in epoch milliseconds.
    pub updated_at: i64,
}

impl Note {
    /// Creates a new unsaved note with a generated id.
    ///
    /// Timestamps are assigned by the repository on insert.
    pub fn new(owner_id: OwnerId, title: impl Into<String>, text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            text,
            represents_keyword_id: None,
            link_intervals: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Returns whether this note is a keyword note.
    pub fn is_keyword_note(&self) -> bool {
        self.represents_keyword_id.is_some()
    }

    /// Note body or the empty string.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Owner-scoped named concept referenced by wikilinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub owner_id: OwnerId,
    pub name: String,
}

/// Association row: a note links to a keyword from its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteKeyword {
    pub note_id: NoteId,
    pub keyword_id: KeywordId,
    pub owner_id: OwnerId,
}

/// Explicit per-field update value.
///
/// Distinguishes "leave as is" from "clear" from "replace".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Cleared,
    SetTo(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// New note body supplied by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    /// Full replacement text.
    Full(String),
    /// Patch text applied to the currently stored body.
    Patch(String),
}

/// Note update request. Fields left `Unchanged` keep their stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteUpdate {
    pub title: FieldUpdate<String>,
    pub text: FieldUpdate<TextEdit>,
    /// `SetTo(true)` designates the note as keyword note; `SetTo(false)` or
    /// `Cleared` drops the designation.
    pub represents_keyword: FieldUpdate<bool>,
}

impl NoteUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: FieldUpdate::SetTo(title.into()),
            ..Self::default()
        }
    }

    pub fn full_text(text: impl Into<String>) -> Self {
        Self {
            text: FieldUpdate::SetTo(TextEdit::Full(text.into())),
            ..Self::default()
        }
    }

    pub fn patch(patch_text: impl Into<String>) -> Self {
        Self {
            text: FieldUpdate::SetTo(TextEdit::Patch(patch_text.into())),
            ..Self::default()
        }
    }
}

/// Note creation request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewNote {
    pub owner_id: OwnerId,
    /// `None` synthesizes the next free `Untitled N` title.
    pub title: Option<String>,
    pub text: Option<String>,
    pub represents_keyword: bool,
}

/// Wikilink autocomplete entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikilinkSuggestion {
    pub title: String,
    /// Whether a keyword note with this title exists.
    pub represents_keyword: bool,
}

/// Count of notes created on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCreationStat {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::LinkInterval;

    #[test]
    fn intervals_sort_by_start() {
        let mut intervals = vec![LinkInterval::new(10, 15), LinkInterval::new(2, 8)];
        intervals.sort();
        assert_eq!(intervals[0].start, 2);
    }

    #[test]
    fn overlap_is_half_open() {
        let interval = LinkInterval::new(6, 14);
        assert!(interval.overlaps(13, 20));
        assert!(!interval.overlaps(14, 20));
        assert!(!interval.overlaps(0, 6));
        assert!(interval.strictly_contains(7));
        assert!(!interval.strictly_contains(6));
        assert!(!interval.strictly_contains(14));
    }
}
