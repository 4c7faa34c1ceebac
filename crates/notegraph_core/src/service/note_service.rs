//! Note lifecycle service.
//!
//! # Responsibility
//! - Orchestrate note create/update/delete across the relational note store,
//!   the keyword ledger and the graph store.
//! - Apply title and keyword-note validation before any write.
//! - Decide when a text edit can skip graph resynchronization and issue
//!   keyword garbage collection after every mutation.
//!
//! # Invariants
//! - Validation failures are reported before the note row is written.
//! - Graph writes are idempotent, so a failed sequence is safe to re-run.
//!   Nothing here rolls back the relational write when the graph write fails.
//! - Logs carry ids and counts only, never titles or note text.

use crate::model::graph::GraphData;
use crate::model::note::{
    FieldUpdate, KeywordId, NewNote, Note, NoteCreationStat, NoteId, NoteUpdate, OwnerId,
    TextEdit,
};
use crate::repo::graph_repo::{GraphRepoError, GraphRepository};
use crate::repo::keyword_repo::{normalize_names, KeywordLedger};
use crate::repo::note_repo::{NoteListQuery, NoteRepository, RepoError};
use crate::text::diff::{apply_patch, graph_sync_required, PatchError};
use crate::text::wikilink::{extract_link_intervals, extract_link_targets_opt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default BFS depth for seeded graph queries.
pub const DEFAULT_GRAPH_DEPTH: u32 = 1;

pub type NoteServiceResult<T> = Result<T, NoteServiceError>;

/// Service error for note lifecycle use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Keyword could not be resolved after creation.
    KeywordNotFound(String),
    NoteTitleRequired,
    NoteTitleAlreadyExists(String),
    /// A keyword note needs a non-empty title.
    KeywordNoteTitleRequired,
    /// Another note already represents the keyword.
    KeywordNoteAlreadyExists(String),
    /// Incremental text patch could not be applied to the stored body.
    PatchApplicationFailed(PatchError),
    /// Relational persistence failure.
    Repo(RepoError),
    /// Graph store failure.
    Graph(GraphRepoError),
    /// Export/import document could not be encoded or decoded.
    Transfer(serde_json::Error),
}

impl NoteServiceError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoteNotFound(_) => "note_not_found",
            Self::KeywordNotFound(_) => "keyword_not_found",
            Self::NoteTitleRequired => "note_title_required",
            Self::NoteTitleAlreadyExists(_) => "note_title_already_exists",
            Self::KeywordNoteTitleRequired => "keyword_note_title_required",
            Self::KeywordNoteAlreadyExists(_) => "keyword_note_already_exists",
            Self::PatchApplicationFailed(_) => "patch_application_failed",
            Self::Repo(_) => "repo_failure",
            Self::Graph(_) => "graph_failure",
            Self::Transfer(_) => "transfer_failure",
        }
    }

    /// Whether this is a caller-facing validation/lookup failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Repo(_) | Self::Graph(_) | Self::Transfer(_))
    }
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::KeywordNotFound(name) => write!(f, "keyword not found: `{name}`"),
            Self::NoteTitleRequired => write!(f, "note title is required"),
            Self::NoteTitleAlreadyExists(title) => {
                write!(f, "note title already exists: `{title}`")
            }
            Self::KeywordNoteTitleRequired => write!(f, "keyword note requires a title"),
            Self::KeywordNoteAlreadyExists(name) => {
                write!(f, "keyword `{name}` is already represented by another note")
            }
            Self::PatchApplicationFailed(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Transfer(err) => write!(f, "invalid note transfer document: {err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PatchApplicationFailed(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Transfer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(note_id) => Self::NoteNotFound(note_id),
            other => Self::Repo(other),
        }
    }
}

impl From<GraphRepoError> for NoteServiceError {
    fn from(value: GraphRepoError) -> Self {
        Self::Graph(value)
    }
}

impl From<PatchError> for NoteServiceError {
    fn from(value: PatchError) -> Self {
        Self::PatchApplicationFailed(value)
    }
}

impl From<serde_json::Error> for NoteServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Transfer(value)
    }
}

/// Note lifecycle facade over the three store contracts.
pub struct NoteService<N: NoteRepository, K: KeywordLedger, G: GraphRepository> {
    notes: N,
    keywords: K,
    graph: G,
    graph_depth: u32,
}

impl<N: NoteRepository, K: KeywordLedger, G: GraphRepository> NoteService<N, K, G> {
    /// Creates a service using the provided store implementations.
    pub fn new(notes: N, keywords: K, graph: G) -> Self {
        Self {
            notes,
            keywords,
            graph,
            graph_depth: DEFAULT_GRAPH_DEPTH,
        }
    }

    /// Overrides the BFS depth used when `get_graph` is called without one.
    pub fn with_graph_depth(mut self, depth: u32) -> Self {
        self.graph_depth = depth;
        self
    }

    pub fn notes(&self) -> &N {
        &self.notes
    }

    pub fn keywords(&self) -> &K {
        &self.keywords
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Creates one note and synchronizes its keywords and graph edges.
    ///
    /// A missing title becomes the smallest free `Untitled N`.
    pub fn create(&self, request: NewNote) -> NoteServiceResult<NoteId> {
        let owner_id = request.owner_id;
        match self.create_note_record(request, None) {
            Ok(note) => {
                info!(
                    "event=note_create module=notes status=ok note_id={} owner_id={} keyword_note={} link_count={}",
                    note.id,
                    owner_id,
                    note.is_keyword_note(),
                    note.link_intervals.len()
                );
                Ok(note.id)
            }
            Err(err) => {
                warn!(
                    "event=note_create module=notes status=error owner_id={} error_code={}",
                    owner_id,
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Applies `update` to one note and returns the stored result.
    pub fn update(&self, note_id: NoteId, update: NoteUpdate) -> NoteServiceResult<Note> {
        match self.update_note_record(note_id, update) {
            Ok((note, synced)) => {
                info!(
                    "event=note_update module=notes status=ok note_id={} graph_sync={} link_count={}",
                    note_id,
                    if synced { "full" } else { "skipped" },
                    note.link_intervals.len()
                );
                Ok(note)
            }
            Err(err) => {
                warn!(
                    "event=note_update module=notes status=error note_id={} error_code={}",
                    note_id,
                    err.code()
                );
                Err(err)
            }
        }
    }

    /// Deletes one note, its associations and its graph node.
    pub fn delete(&self, note_id: NoteId) -> NoteServiceResult<()> {
        let result = self.delete_note_record(note_id);
        match &result {
            Ok(removed) => info!(
                "event=note_delete module=notes status=ok note_id={} keywords_removed={}",
                note_id, removed
            ),
            Err(err) => warn!(
                "event=note_delete module=notes status=error note_id={} error_code={}",
                note_id,
                err.code()
            ),
        }
        result.map(|_| ())
    }

    /// Gets one note by id.
    pub fn get_note(&self, note_id: NoteId) -> NoteServiceResult<Option<Note>> {
        Ok(self.notes.get_note(note_id)?)
    }

    /// Lists one owner's notes created within an optional inclusive window.
    pub fn list_notes(
        &self,
        owner_id: OwnerId,
        created_from: Option<i64>,
        created_to: Option<i64>,
    ) -> NoteServiceResult<Vec<Note>> {
        let query = NoteListQuery {
            created_from,
            created_to,
        };
        Ok(self.notes.list_notes(owner_id, &query)?)
    }

    pub fn note_creation_stats(&self, owner_id: OwnerId) -> NoteServiceResult<Vec<NoteCreationStat>> {
        Ok(self.notes.note_creation_stats(owner_id)?)
    }

    /// Returns the keyword graph projection of one owner.
    ///
    /// `depth` falls back to the configured default.
    pub fn get_graph(
        &self,
        owner_id: OwnerId,
        query: Option<&str>,
        depth: Option<u32>,
    ) -> NoteServiceResult<GraphData> {
        let depth = depth.unwrap_or(self.graph_depth);
        let graph = self.graph.get_graph(owner_id, query, depth)?;
        debug!(
            "event=graph_query module=graph status=ok owner_id={} seeded={} depth={} nodes={} connections={}",
            owner_id,
            query.is_some(),
            depth,
            graph.nodes.len(),
            graph.connections.len()
        );
        Ok(graph)
    }

    /// Shared create path; `timestamps` preserves imported `(created, updated)`.
    pub(crate) fn create_note_record(
        &self,
        request: NewNote,
        timestamps: Option<(i64, i64)>,
    ) -> NoteServiceResult<Note> {
        let owner_id = request.owner_id;
        let title = match request.title {
            Some(raw) => required_title(&raw, request.represents_keyword)?,
            None => self.next_untitled_title(owner_id)?,
        };

        if self.notes.count_notes_by_title(owner_id, &title, None)? > 0 {
            return Err(NoteServiceError::NoteTitleAlreadyExists(title));
        }

        let mut note = Note::new(owner_id, title, request.text);
        if request.represents_keyword {
            note.represents_keyword_id = Some(self.resolve_keyword(owner_id, &note.title, None)?);
        }
        note.link_intervals = extract_link_intervals(note.text_or_empty());
        if let Some((created_at, updated_at)) = timestamps {
            note.created_at = created_at;
            note.updated_at = updated_at;
        }

        self.notes.create_note(&note)?;
        self.graph.upsert_note(&note)?;

        let targets = extract_link_targets_opt(note.text.as_deref());
        self.keywords
            .replace_note_keywords(note.id, owner_id, &targets)?;
        self.graph.sync_connections(&note, &targets, None, None)?;
        Ok(note)
    }

    fn update_note_record(
        &self,
        note_id: NoteId,
        update: NoteUpdate,
    ) -> NoteServiceResult<(Note, bool)> {
        let mut note = self
            .notes
            .get_note(note_id)?
            .ok_or(NoteServiceError::NoteNotFound(note_id))?;
        let owner_id = note.owner_id;
        let previous_title = note.title.clone();
        let previous_keyword = note.represents_keyword_id;
        let previous_intervals = note.link_intervals.clone();
        let previous_text = note.text.clone();
        let previous_targets = extract_link_targets_opt(previous_text.as_deref());

        let wants_keyword = match update.represents_keyword {
            FieldUpdate::Unchanged => previous_keyword.is_some(),
            FieldUpdate::Cleared => false,
            FieldUpdate::SetTo(value) => value,
        };

        let title_changed = match update.title {
            FieldUpdate::Unchanged => false,
            FieldUpdate::Cleared => return Err(missing_title_error(wants_keyword)),
            FieldUpdate::SetTo(raw) => {
                let title = required_title(&raw, wants_keyword)?;
                if title == note.title {
                    false
                } else {
                    if self
                        .notes
                        .count_notes_by_title(owner_id, &title, Some(note_id))?
                        > 0
                    {
                        return Err(NoteServiceError::NoteTitleAlreadyExists(title));
                    }
                    note.title = title;
                    true
                }
            }
        };

        let incremental = matches!(update.text, FieldUpdate::SetTo(TextEdit::Patch(_)));
        match update.text {
            FieldUpdate::Unchanged => {}
            FieldUpdate::Cleared => note.text = None,
            FieldUpdate::SetTo(TextEdit::Full(text)) => note.text = Some(text),
            FieldUpdate::SetTo(TextEdit::Patch(patch_text)) => {
                note.text = Some(apply_patch(note.text_or_empty(), &patch_text)?);
            }
        }

        if !wants_keyword {
            note.represents_keyword_id = None;
        } else if title_changed || previous_keyword.is_none() {
            note.represents_keyword_id =
                Some(self.resolve_keyword(owner_id, &note.title, Some(note_id))?);
        }
        let keyword_changed = note.represents_keyword_id != previous_keyword;

        note.link_intervals = extract_link_intervals(note.text_or_empty());
        self.notes.update_note(&note)?;
        self.graph.upsert_note(&note)?;

        let current_targets = extract_link_targets_opt(note.text.as_deref());
        let synced = title_changed
            || keyword_changed
            || graph_sync_required(
                &previous_intervals,
                incremental,
                previous_text.as_deref().unwrap_or(""),
                note.text_or_empty(),
            );
        if synced {
            self.keywords
                .replace_note_keywords(note_id, owner_id, &current_targets)?;
            self.graph.sync_connections(
                &note,
                &current_targets,
                Some(previous_title.as_str()),
                previous_keyword,
            )?;
        }

        let mut before = previous_targets;
        if previous_keyword.is_some() {
            before.push(previous_title);
        }
        let mut after = current_targets;
        if note.is_keyword_note() {
            after.push(note.title.clone());
        }
        let candidates = garbage_candidates(&before, &after);
        let removed = self.keywords.delete_unused_keywords(owner_id, &candidates)?;
        debug!(
            "event=keyword_gc module=keywords status=ok note_id={} candidates={} removed={}",
            note_id,
            candidates.len(),
            removed
        );

        let stored = self
            .notes
            .get_note(note_id)?
            .ok_or(NoteServiceError::NoteNotFound(note_id))?;
        Ok((stored, synced))
    }

    fn delete_note_record(&self, note_id: NoteId) -> NoteServiceResult<usize> {
        let note = self
            .notes
            .get_note(note_id)?
            .ok_or(NoteServiceError::NoteNotFound(note_id))?;

        let mut cleanup = extract_link_targets_opt(note.text.as_deref());
        if note.is_keyword_note() {
            cleanup.push(note.title.clone());
        }

        self.notes.delete_note(note_id)?;
        self.keywords.delete_note_keywords(note_id)?;
        let removed = self
            .keywords
            .delete_unused_keywords(note.owner_id, &cleanup)?;
        self.graph.delete_note(note_id)?;
        Ok(removed)
    }

    /// Resolves the keyword a note titled `title` is about to represent.
    ///
    /// Fails when another note (other than `exclude_note_id`) already
    /// represents a keyword of that name.
    fn resolve_keyword(
        &self,
        owner_id: OwnerId,
        title: &str,
        exclude_note_id: Option<NoteId>,
    ) -> NoteServiceResult<KeywordId> {
        if title.trim().is_empty() {
            return Err(NoteServiceError::KeywordNoteTitleRequired);
        }

        if let Some(existing) = self.keywords.get_keyword(owner_id, title)? {
            let representing =
                self.notes
                    .count_representing_notes(owner_id, existing.id, exclude_note_id)?;
            if representing > 0 {
                return Err(NoteServiceError::KeywordNoteAlreadyExists(
                    title.to_string(),
                ));
            }
            return Ok(existing.id);
        }

        self.keywords
            .ensure_keywords(owner_id, &[title.to_string()])?;
        self.keywords
            .get_keyword(owner_id, title)?
            .map(|keyword| keyword.id)
            .ok_or_else(|| NoteServiceError::KeywordNotFound(title.to_string()))
    }

    fn next_untitled_title(&self, owner_id: OwnerId) -> NoteServiceResult<String> {
        let mut n: u64 = 1;
        loop {
            let candidate = format!("Untitled {n}");
            if self.notes.count_notes_by_title(owner_id, &candidate, None)? == 0 {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn missing_title_error(wants_keyword: bool) -> NoteServiceError {
    if wants_keyword {
        NoteServiceError::KeywordNoteTitleRequired
    } else {
        NoteServiceError::NoteTitleRequired
    }
}

fn required_title(raw: &str, wants_keyword: bool) -> NoteServiceResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(missing_title_error(wants_keyword));
    }
    Ok(title.to_string())
}

/// Names in `before` that no longer appear in `after`, normalized.
fn garbage_candidates(before: &[String], after: &[String]) -> Vec<String> {
    let kept: HashSet<String> = normalize_names(after).into_iter().collect();
    normalize_names(before)
        .into_iter()
        .filter(|name| !kept.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{garbage_candidates, required_title, NoteServiceError};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn garbage_candidates_subtracts_current_names() {
        let before = names(&["Apple", " Banana", "Old"]);
        let after = names(&["Banana", "New"]);
        assert_eq!(garbage_candidates(&before, &after), names(&["Apple", "Old"]));
    }

    #[test]
    fn blank_title_maps_to_designation_specific_error() {
        assert!(matches!(
            required_title("   ", false),
            Err(NoteServiceError::NoteTitleRequired)
        ));
        assert!(matches!(
            required_title("", true),
            Err(NoteServiceError::KeywordNoteTitleRequired)
        ));
        assert_eq!(required_title("  Alpha ", true).unwrap(), "Alpha");
    }
}
