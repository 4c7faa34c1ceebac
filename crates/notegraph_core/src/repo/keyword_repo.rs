//! Keyword ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own keyword rows and note/keyword associations.
//! - Replace a note's associations wholesale with atomic semantics.
//! - Garbage-collect keywords that are neither linked nor represented.
//!
//! # Invariants
//! - Keyword names are trimmed, non-empty and unique per owner.
//! - Keyword creation is create-or-ignore, so concurrent creators converge.
//! - `delete_unused_keywords` never removes a keyword that still has an
//!   association or a representing note.

use crate::model::note::{Keyword, NoteId, OwnerId};
use crate::repo::missing_table;
use crate::repo::note_repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashSet;
use uuid::Uuid;

/// Keyword ledger interface consumed by the note lifecycle service.
pub trait KeywordLedger {
    /// Creates missing keywords for `owner_id`; existing names are left untouched.
    fn ensure_keywords(&self, owner_id: OwnerId, names: &[String]) -> RepoResult<()>;
    /// Looks up one keyword by exact (normalized) name.
    fn get_keyword(&self, owner_id: OwnerId, name: &str) -> RepoResult<Option<Keyword>>;
    /// Replaces all associations of one note in a single transaction.
    fn replace_note_keywords(
        &self,
        note_id: NoteId,
        owner_id: OwnerId,
        names: &[String],
    ) -> RepoResult<()>;
    /// Keyword names currently associated with one note, sorted by name.
    fn note_keyword_names(&self, note_id: NoteId) -> RepoResult<Vec<String>>;
    /// Drops all associations of one note.
    fn delete_note_keywords(&self, note_id: NoteId) -> RepoResult<()>;
    /// Deletes unreferenced, unrepresented keywords among `names`.
    ///
    /// Returns the number of deleted keyword rows.
    fn delete_unused_keywords(&self, owner_id: OwnerId, names: &[String]) -> RepoResult<usize>;
    /// Lists one owner's keywords sorted by name.
    fn list_keywords(&self, owner_id: OwnerId) -> RepoResult<Vec<Keyword>>;
}

/// SQLite-backed keyword ledger.
pub struct SqliteKeywordLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKeywordLedger<'conn> {
    /// Constructs a ledger from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        if let Some(table) = missing_table(conn, &["notes", "keywords", "note_keywords"])? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        Ok(Self { conn })
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl KeywordLedger for SqliteKeywordLedger<'_> {
    fn ensure_keywords(&self, owner_id: OwnerId, names: &[String]) -> RepoResult<()> {
        let normalized = normalize_names(names);
        if normalized.is_empty() {
            return Ok(());
        }

        let tx = self.begin()?;
        insert_missing_keywords(&tx, owner_id, &normalized)?;
        tx.commit()?;
        Ok(())
    }

    fn get_keyword(&self, owner_id: OwnerId, name: &str) -> RepoResult<Option<Keyword>> {
        let found = self
            .conn
            .query_row(
                "SELECT uuid, owner_uuid, name
                 FROM keywords
                 WHERE owner_uuid = ?1 AND name = ?2;",
                params![owner_id.to_string(), name.trim()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match found {
            Some((uuid, owner, name)) => Ok(Some(Keyword {
                id: parse_uuid(&uuid, "keywords.uuid")?,
                owner_id: parse_uuid(&owner, "keywords.owner_uuid")?,
                name,
            })),
            None => Ok(None),
        }
    }

    fn replace_note_keywords(
        &self,
        note_id: NoteId,
        owner_id: OwnerId,
        names: &[String],
    ) -> RepoResult<()> {
        let normalized = normalize_names(names);
        let note_uuid = note_id.to_string();
        let owner_uuid = owner_id.to_string();

        let tx = self.begin()?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE uuid = ?1);",
            [note_uuid.as_str()],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound(note_id));
        }

        tx.execute(
            "DELETE FROM note_keywords WHERE note_uuid = ?1;",
            [note_uuid.as_str()],
        )?;
        insert_missing_keywords(&tx, owner_id, &normalized)?;
        for name in &normalized {
            tx.execute(
                "INSERT OR IGNORE INTO note_keywords (note_uuid, keyword_uuid, owner_uuid)
                 SELECT ?1, uuid, owner_uuid
                 FROM keywords
                 WHERE owner_uuid = ?2 AND name = ?3;",
                params![note_uuid.as_str(), owner_uuid.as_str(), name.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn note_keyword_names(&self, note_id: NoteId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT k.name
             FROM note_keywords nk
             INNER JOIN keywords k ON k.uuid = nk.keyword_uuid
             WHERE nk.note_uuid = ?1
             ORDER BY k.name ASC;",
        )?;
        let mut rows = stmt.query([note_id.to_string()])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    fn delete_note_keywords(&self, note_id: NoteId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM note_keywords WHERE note_uuid = ?1;",
            [note_id.to_string()],
        )?;
        Ok(())
    }

    fn delete_unused_keywords(&self, owner_id: OwnerId, names: &[String]) -> RepoResult<usize> {
        let normalized = normalize_names(names);
        if normalized.is_empty() {
            return Ok(0);
        }

        let owner_uuid = owner_id.to_string();
        let tx = self.begin()?;
        let mut deleted = 0;
        for name in &normalized {
            deleted += tx.execute(
                "DELETE FROM keywords
                 WHERE owner_uuid = ?1
                   AND name = ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM note_keywords nk
                       WHERE nk.keyword_uuid = keywords.uuid
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM notes n
                       WHERE n.owner_uuid = ?1
                         AND n.represents_keyword_uuid = keywords.uuid
                   );",
                params![owner_uuid.as_str(), name.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn list_keywords(&self, owner_id: OwnerId) -> RepoResult<Vec<Keyword>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name
             FROM keywords
             WHERE owner_uuid = ?1
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut keywords = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            keywords.push(Keyword {
                id: parse_uuid(&uuid_text, "keywords.uuid")?,
                owner_id,
                name: row.get(1)?,
            });
        }
        Ok(keywords)
    }
}

/// Trims names, drops empties and deduplicates preserving first occurrence.
pub fn normalize_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() || !seen.insert(trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

fn insert_missing_keywords(conn: &Connection, owner_id: OwnerId, names: &[String]) -> RepoResult<()> {
    let owner_uuid = owner_id.to_string();
    for name in names {
        conn.execute(
            "INSERT INTO keywords (uuid, owner_uuid, name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (owner_uuid, name) DO NOTHING;",
            params![Uuid::new_v4().to_string(), owner_uuid.as_str(), name.as_str()],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::normalize_names;

    #[test]
    fn normalize_trims_drops_empty_and_dedupes_in_order() {
        let names = vec![
            " Beta ".to_string(),
            "Alpha".to_string(),
            "   ".to_string(),
            "Beta".to_string(),
            "alpha".to_string(),
        ];
        assert_eq!(
            normalize_names(&names),
            vec!["Beta".to_string(), "Alpha".to_string(), "alpha".to_string()]
        );
    }
}
