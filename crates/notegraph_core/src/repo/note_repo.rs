//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide owner-scoped CRUD APIs over the authoritative `notes` table.
//! - Serve the uniqueness probes used by title and keyword-note validation.
//!
//! # Invariants
//! - `(owner_uuid, title)` is unique; at most one row references a keyword
//!   through `represents_keyword_uuid`.
//! - `link_intervals` is persisted as a JSON array of `{start, end}` objects.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::note::{KeywordId, LinkInterval, Note, NoteCreationStat, NoteId, OwnerId};
use crate::repo::missing_table;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub(crate) const NOTE_SELECT_SQL: &str = "SELECT
    uuid,
    owner_uuid,
    title,
    text,
    represents_keyword_uuid,
    link_intervals,
    created_at,
    updated_at
FROM notes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Relational repository error for note and keyword persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(NoteId),
    InvalidData(String),
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "note repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing one owner's notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Inclusive lower bound on `created_at` (epoch ms).
    pub created_from: Option<i64>,
    /// Inclusive upper bound on `created_at` (epoch ms).
    pub created_to: Option<i64>,
}

/// Repository interface for authoritative note rows.
pub trait NoteRepository {
    /// Inserts one note. Zero timestamps are assigned by storage.
    fn create_note(&self, note: &Note) -> RepoResult<()>;
    /// Gets one note by id.
    fn get_note(&self, note_id: NoteId) -> RepoResult<Option<Note>>;
    /// Persists title, text, keyword designation and link intervals.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    /// Deletes one note row.
    fn delete_note(&self, note_id: NoteId) -> RepoResult<()>;
    /// Lists one owner's notes ordered by `created_at ASC, uuid ASC`.
    fn list_notes(&self, owner_id: OwnerId, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    /// Counts owner notes with exactly `title`, optionally excluding one note.
    fn count_notes_by_title(
        &self,
        owner_id: OwnerId,
        title: &str,
        exclude_note_id: Option<NoteId>,
    ) -> RepoResult<u32>;
    /// Counts owner notes representing `keyword_id`, optionally excluding one note.
    fn count_representing_notes(
        &self,
        owner_id: OwnerId,
        keyword_id: KeywordId,
        exclude_note_id: Option<NoteId>,
    ) -> RepoResult<u32>;
    /// Per-day creation counts for one owner, ordered by date.
    fn note_creation_stats(&self, owner_id: OwnerId) -> RepoResult<Vec<NoteCreationStat>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        if let Some(table) = missing_table(conn, &["notes", "keywords", "note_keywords"])? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &Note) -> RepoResult<()> {
        let intervals = encode_intervals(&note.link_intervals)?;
        self.conn.execute(
            "INSERT INTO notes (
                uuid,
                owner_uuid,
                title,
                text,
                represents_keyword_uuid,
                link_intervals,
                created_at,
                updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                COALESCE(?7, CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)),
                COALESCE(?8, CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER))
            );",
            params![
                note.id.to_string(),
                note.owner_id.to_string(),
                note.title.as_str(),
                note.text.as_deref(),
                note.represents_keyword_id.map(|id| id.to_string()),
                intervals,
                positive_timestamp(note.created_at),
                positive_timestamp(note.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_note(&self, note_id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([note_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        let intervals = encode_intervals(&note.link_intervals)?;
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?2,
                text = ?3,
                represents_keyword_uuid = ?4,
                link_intervals = ?5,
                updated_at = CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)
             WHERE uuid = ?1;",
            params![
                note.id.to_string(),
                note.title.as_str(),
                note.text.as_deref(),
                note.represents_keyword_id.map(|id| id.to_string()),
                intervals,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(note.id));
        }
        Ok(())
    }

    fn delete_note(&self, note_id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE uuid = ?1;", [note_id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(note_id));
        }
        Ok(())
    }

    fn list_notes(&self, owner_id: OwnerId, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE owner_uuid = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(owner_id.to_string())];

        if let Some(from) = query.created_from {
            sql.push_str(" AND created_at >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(to) = query.created_to {
            sql.push_str(" AND created_at <= ?");
            bind_values.push(Value::Integer(to));
        }
        sql.push_str(" ORDER BY created_at ASC, uuid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn count_notes_by_title(
        &self,
        owner_id: OwnerId,
        title: &str,
        exclude_note_id: Option<NoteId>,
    ) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notes
             WHERE owner_uuid = ?1
               AND title = ?2
               AND (?3 IS NULL OR uuid <> ?3);",
            params![
                owner_id.to_string(),
                title,
                exclude_note_id.map(|id| id.to_string())
            ],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn count_representing_notes(
        &self,
        owner_id: OwnerId,
        keyword_id: KeywordId,
        exclude_note_id: Option<NoteId>,
    ) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notes
             WHERE owner_uuid = ?1
               AND represents_keyword_uuid = ?2
               AND (?3 IS NULL OR uuid <> ?3);",
            params![
                owner_id.to_string(),
                keyword_id.to_string(),
                exclude_note_id.map(|id| id.to_string())
            ],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn note_creation_stats(&self, owner_id: OwnerId) -> RepoResult<Vec<NoteCreationStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                date(created_at / 1000, 'unixepoch') AS day,
                COUNT(*) AS total
             FROM notes
             WHERE owner_uuid = ?1
             GROUP BY day
             ORDER BY day ASC;",
        )?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut stats = Vec::new();
        while let Some(row) = rows.next()? {
            stats.push(NoteCreationStat {
                date: row.get("day")?,
                count: row.get("total")?,
            });
        }
        Ok(stats)
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    let represents = match row.get::<_, Option<String>>("represents_keyword_uuid")? {
        Some(value) => Some(parse_uuid(&value, "notes.represents_keyword_uuid")?),
        None => None,
    };
    let intervals_text: String = row.get("link_intervals")?;
    let link_intervals: Vec<LinkInterval> =
        serde_json::from_str(&intervals_text).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid link_intervals `{intervals_text}` in notes.link_intervals: {err}"
            ))
        })?;

    Ok(Note {
        id: parse_uuid(&uuid_text, "notes.uuid")?,
        owner_id: parse_uuid(&owner_text, "notes.owner_uuid")?,
        title: row.get("title")?,
        text: row.get("text")?,
        represents_keyword_id: represents,
        link_intervals,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn encode_intervals(intervals: &[LinkInterval]) -> RepoResult<String> {
    serde_json::to_string(intervals)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode link intervals: {err}")))
}

fn positive_timestamp(value: i64) -> Option<i64> {
    if value > 0 {
        Some(value)
    } else {
        None
    }
}
