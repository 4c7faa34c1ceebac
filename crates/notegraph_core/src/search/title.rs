//! Title and wikilink-suggestion search over the relational store.
//!
//! # Responsibility
//! - Find one owner's notes by exact or substring title match.
//! - Suggest wikilink targets while the user types `[[...`.
//!
//! # Invariants
//! - Results never cross owners.
//! - Substring matching is case-insensitive with Unicode lowercase folding.
//! - Suggestions list keyword notes before bare keywords, each ordered by title.

use crate::db::DbError;
use crate::model::note::{Note, OwnerId, WikilinkSuggestion};
use crate::repo::note_repo::{parse_note_row, RepoError, NOTE_SELECT_SQL};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of wikilink suggestions.
pub const DEFAULT_SUGGESTION_LIMIT: u32 = 20;
/// Hard cap on wikilink suggestions per request.
pub const MAX_SUGGESTION_LIMIT: u32 = 50;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RepoError> for SearchError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Wikilink suggestion request.
#[derive(Debug, Clone)]
pub struct SuggestionQuery {
    /// Partial target typed by the user.
    pub text: String,
    /// Maximum number of suggestions, clamped to [`MAX_SUGGESTION_LIMIT`].
    pub limit: u32,
}

impl SuggestionQuery {
    /// Creates a query with the default limit.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    fn effective_limit(&self) -> usize {
        self.limit.min(MAX_SUGGESTION_LIMIT) as usize
    }
}

/// Searches one owner's notes by title, ordered by title.
///
/// With `exact_match` the raw query must equal the title. Otherwise the query
/// is trimmed and matched as a case-insensitive substring. Blank queries
/// return an empty list.
pub fn search_notes_by_title(
    conn: &Connection,
    owner_id: OwnerId,
    query: &str,
    exact_match: bool,
) -> SearchResult<Vec<Note>> {
    if exact_match {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "{NOTE_SELECT_SQL} WHERE owner_uuid = ?1 AND title = ?2 ORDER BY title ASC;"
        ))?;
        let mut rows = stmt.query(params![owner_id.to_string(), query])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        return Ok(notes);
    }

    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL} WHERE owner_uuid = ?1 ORDER BY title ASC;"
    ))?;
    let mut rows = stmt.query([owner_id.to_string()])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        let title: String = row.get("title")?;
        if title.to_lowercase().contains(&needle) {
            notes.push(parse_note_row(row)?);
        }
    }
    Ok(notes)
}

/// Suggests wikilink targets for a partially typed `[[...`.
///
/// Keyword-note titles come first, then keywords that no note represents.
/// A blank query matches everything up to the limit.
pub fn search_wikilink_suggestions(
    conn: &Connection,
    owner_id: OwnerId,
    query: &SuggestionQuery,
) -> SearchResult<Vec<WikilinkSuggestion>> {
    let limit = query.effective_limit();
    if limit == 0 {
        return Ok(Vec::new());
    }
    let needle = query.text.trim().to_lowercase();
    let owner_uuid = owner_id.to_string();
    let mut suggestions = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT title
         FROM notes
         WHERE owner_uuid = ?1 AND represents_keyword_uuid IS NOT NULL
         ORDER BY title ASC;",
    )?;
    let mut rows = stmt.query([owner_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        let title: String = row.get(0)?;
        if title.to_lowercase().contains(&needle) {
            suggestions.push(WikilinkSuggestion {
                title,
                represents_keyword: true,
            });
            if suggestions.len() == limit {
                return Ok(suggestions);
            }
        }
    }

    let mut stmt = conn.prepare(
        "SELECT k.name
         FROM keywords k
         WHERE k.owner_uuid = ?1
           AND NOT EXISTS (
               SELECT 1 FROM notes n
               WHERE n.represents_keyword_uuid = k.uuid
           )
         ORDER BY k.name ASC;",
    )?;
    let mut rows = stmt.query([owner_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        if name.to_lowercase().contains(&needle) {
            suggestions.push(WikilinkSuggestion {
                title: name,
                represents_keyword: false,
            });
            if suggestions.len() == limit {
                break;
            }
        }
    }

    Ok(suggestions)
}
