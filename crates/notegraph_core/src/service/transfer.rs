//! JSON export/import of one owner's notes.
//!
//! # Invariants
//! - Import goes through the normal create path, so keyword designation is
//!   validated and both the keyword ledger and the graph are synchronized.
//! - Imported notes get fresh ids; supplied timestamps are preserved.

use crate::model::note::{NewNote, OwnerId};
use crate::repo::graph_repo::GraphRepository;
use crate::repo::keyword_repo::KeywordLedger;
use crate::repo::note_repo::{NoteListQuery, NoteRepository};
use crate::service::note_service::{NoteService, NoteServiceResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Portable note document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDocument {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub represents_keyword: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Outcome of one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: u32,
    pub skipped: u32,
}

impl<N: NoteRepository, K: KeywordLedger, G: GraphRepository> NoteService<N, K, G> {
    /// Serializes one owner's notes as a JSON array ordered by creation.
    pub fn export_notes(&self, owner_id: OwnerId) -> NoteServiceResult<String> {
        let notes = self
            .notes()
            .list_notes(owner_id, &NoteListQuery::default())?;
        let documents: Vec<NoteDocument> = notes
            .into_iter()
            .map(|note| NoteDocument {
                id: Some(note.id),
                represents_keyword: note.is_keyword_note(),
                title: note.title,
                text: note.text,
                created_at: note.created_at,
                updated_at: note.updated_at,
            })
            .collect();
        info!(
            "event=note_export module=transfer status=ok owner_id={} count={}",
            owner_id,
            documents.len()
        );
        Ok(serde_json::to_string_pretty(&documents)?)
    }

    /// Imports a JSON array produced by [`NoteService::export_notes`].
    ///
    /// Documents with a blank or already used title, or whose keyword
    /// designation is rejected, are skipped. Store failures abort the import.
    pub fn import_notes(&self, owner_id: OwnerId, json: &str) -> NoteServiceResult<ImportReport> {
        let documents: Vec<NoteDocument> = serde_json::from_str(json)?;
        let mut report = ImportReport::default();

        for document in documents {
            let title = document.title.trim();
            if title.is_empty()
                || self.notes().count_notes_by_title(owner_id, title, None)? > 0
            {
                report.skipped += 1;
                continue;
            }

            let request = NewNote {
                owner_id,
                title: Some(title.to_string()),
                text: document.text,
                represents_keyword: document.represents_keyword,
            };
            match self.create_note_record(
                request,
                Some((document.created_at, document.updated_at)),
            ) {
                Ok(_) => report.imported += 1,
                Err(err) if err.is_validation() => {
                    warn!(
                        "event=note_import module=transfer status=skipped owner_id={} error_code={}",
                        owner_id,
                        err.code()
                    );
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "event=note_import module=transfer status=ok owner_id={} imported={} skipped={}",
            owner_id, report.imported, report.skipped
        );
        Ok(report)
    }
}
