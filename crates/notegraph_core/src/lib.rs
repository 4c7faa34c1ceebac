//! Note, keyword and graph synchronization engine.
//! This crate is the single source of truth for note/keyword invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod text;

pub use config::EngineConfig;
pub use db::{
    open_db, open_db_in_memory, open_graph_db, open_graph_db_in_memory, DbError, DbResult,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::graph::{ConnectionKind, GraphConnection, GraphData, GraphNode};
pub use model::note::{
    FieldUpdate, Keyword, KeywordId, LinkInterval, NewNote, Note, NoteCreationStat, NoteId,
    NoteUpdate, OwnerId, TextEdit, WikilinkSuggestion,
};
pub use repo::graph_repo::{
    GraphRepoError, GraphRepoResult, GraphRepository, SqliteGraphRepository,
};
pub use repo::keyword_repo::{normalize_names, KeywordLedger, SqliteKeywordLedger};
pub use repo::note_repo::{
    NoteListQuery, NoteRepository, RepoError, RepoResult, SqliteNoteRepository,
};
pub use search::title::{
    search_notes_by_title, search_wikilink_suggestions, SearchError, SearchResult,
    SuggestionQuery,
};
pub use service::note_service::{NoteService, NoteServiceError, NoteServiceResult};
pub use service::transfer::{ImportReport, NoteDocument};
pub use text::diff::{
    apply_patch, compute_diff, contains_new_link_markers, graph_sync_required, make_patch_text,
    touches_protected_ranges, DiffOp, DiffSpan, PatchError,
};
pub use text::wikilink::{extract_link_intervals, extract_link_targets};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
