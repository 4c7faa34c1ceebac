use notegraph_core::db::{open_db_in_memory, open_graph_db_in_memory};
use notegraph_core::model::graph::{keyword_note_node_id, GraphNode};
use notegraph_core::text::diff::make_patch_text;
use notegraph_core::{
    FieldUpdate, GraphData, GraphRepoResult, GraphRepository, KeywordId, KeywordLedger,
    LinkInterval, NewNote, Note, NoteId, NoteRepository, NoteService, NoteServiceError,
    NoteUpdate, OwnerId, SqliteGraphRepository, SqliteKeywordLedger, SqliteNoteRepository,
    TextEdit,
};
use rusqlite::Connection;
use std::cell::Cell;
use uuid::Uuid;

/// Graph store wrapper counting `sync_connections` calls.
struct RecordingGraphStore<'conn> {
    inner: SqliteGraphRepository<'conn>,
    sync_calls: Cell<u32>,
}

impl<'conn> RecordingGraphStore<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteGraphRepository::try_new(conn).unwrap(),
            sync_calls: Cell::new(0),
        }
    }

    fn sync_calls(&self) -> u32 {
        self.sync_calls.get()
    }
}

impl GraphRepository for RecordingGraphStore<'_> {
    fn upsert_note(&self, note: &Note) -> GraphRepoResult<()> {
        self.inner.upsert_note(note)
    }

    fn sync_connections(
        &self,
        note: &Note,
        targets: &[String],
        previous_title: Option<&str>,
        previous_represents_keyword_id: Option<KeywordId>,
    ) -> GraphRepoResult<()> {
        self.sync_calls.set(self.sync_calls.get() + 1);
        self.inner
            .sync_connections(note, targets, previous_title, previous_represents_keyword_id)
    }

    fn delete_note(&self, note_id: NoteId) -> GraphRepoResult<()> {
        self.inner.delete_note(note_id)
    }

    fn count_notes_by_title(&self, owner_id: OwnerId, title: &str) -> GraphRepoResult<u32> {
        self.inner.count_notes_by_title(owner_id, title)
    }

    fn count_links_between(
        &self,
        owner_id: OwnerId,
        from_title: &str,
        to_title: &str,
    ) -> GraphRepoResult<u32> {
        self.inner.count_links_between(owner_id, from_title, to_title)
    }

    fn get_graph(
        &self,
        owner_id: OwnerId,
        query: Option<&str>,
        depth: u32,
    ) -> GraphRepoResult<GraphData> {
        self.inner.get_graph(owner_id, query, depth)
    }

    fn keyword_names_for_note(&self, note_id: NoteId) -> GraphRepoResult<Vec<String>> {
        self.inner.keyword_names_for_note(note_id)
    }
}

type TestService<'conn> = NoteService<
    SqliteNoteRepository<'conn>,
    SqliteKeywordLedger<'conn>,
    RecordingGraphStore<'conn>,
>;

fn service<'conn>(relational: &'conn Connection, graph: &'conn Connection) -> TestService<'conn> {
    NoteService::new(
        SqliteNoteRepository::try_new(relational).unwrap(),
        SqliteKeywordLedger::try_new(relational).unwrap(),
        RecordingGraphStore::new(graph),
    )
}

fn create(
    service: &TestService<'_>,
    owner: OwnerId,
    title: &str,
    text: Option<&str>,
    represents_keyword: bool,
) -> NoteId {
    service
        .create(NewNote {
            owner_id: owner,
            title: Some(title.to_string()),
            text: text.map(str::to_string),
            represents_keyword,
        })
        .unwrap()
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn keyword_note_and_reference_round_trip() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let alpha = create(&service, owner, "Alpha", None, true);
    let beta = create(
        &service,
        owner,
        "Beta",
        Some("links [[Alpha]] and [[Orphan]]"),
        false,
    );

    assert_eq!(
        service.graph().count_links_between(owner, "Beta", "Alpha").unwrap(),
        1
    );
    assert_eq!(
        service.graph().keyword_names_for_note(beta).unwrap(),
        names(&["Alpha", "Orphan"])
    );

    let projection = service.get_graph(owner, None, None).unwrap();
    assert!(matches!(
        projection.node(&keyword_note_node_id(alpha)),
        Some(GraphNode::KeywordNote { title, .. }) if title == "Alpha"
    ));
    assert_eq!(
        projection.node("keyword:Orphan"),
        Some(&GraphNode::Keyword {
            title: "Orphan".to_string(),
            has_representing_note: false,
        })
    );

    service.delete(alpha).unwrap();
    assert_eq!(
        service.graph().count_links_between(owner, "Beta", "Alpha").unwrap(),
        0
    );
    assert_eq!(service.graph().count_notes_by_title(owner, "Alpha").unwrap(), 0);
    let projection = service.get_graph(owner, None, None).unwrap();
    assert!(projection.node(&keyword_note_node_id(alpha)).is_none());
    // Beta still links to the concept.
    assert!(service.keywords().get_keyword(owner, "Alpha").unwrap().is_some());
    assert_eq!(service.get_note(alpha).unwrap(), None);
}

#[test]
fn rename_keyword_note_keeps_references_on_keyword_identity() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let old = create(&service, owner, "Old", None, true);
    let reader = create(&service, owner, "Reader", Some("see [[Old]]"), false);
    assert_eq!(
        service.graph().count_links_between(owner, "Reader", "Old").unwrap(),
        1
    );

    let renamed = service.update(old, NoteUpdate::title("New")).unwrap();
    assert_eq!(renamed.title, "New");

    assert_eq!(service.graph().count_notes_by_title(owner, "Old").unwrap(), 0);
    assert_eq!(service.graph().count_notes_by_title(owner, "New").unwrap(), 1);
    assert_eq!(
        service.graph().keyword_names_for_note(reader).unwrap(),
        names(&["Old"])
    );
    assert_eq!(
        service.graph().count_links_between(owner, "Reader", "New").unwrap(),
        0
    );

    let new_keyword = service.keywords().get_keyword(owner, "New").unwrap().unwrap();
    assert_eq!(renamed.represents_keyword_id, Some(new_keyword.id));
    assert!(service.keywords().get_keyword(owner, "Old").unwrap().is_some());
}

#[test]
fn patch_outside_link_skips_graph_sync() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let original = "Hello [[Link]] world";
    let note_id = create(&service, owner, "Doc", Some(original), false);
    assert_eq!(service.graph().sync_calls(), 1);

    let edited = "Intro. Hello [[Link]] Environment";
    let updated = service
        .update(note_id, NoteUpdate::patch(make_patch_text(original, edited)))
        .unwrap();

    assert_eq!(service.graph().sync_calls(), 1);
    assert_eq!(updated.text.as_deref(), Some(edited));
    assert_eq!(updated.link_intervals, vec![LinkInterval::new(13, 21)]);
    assert_eq!(
        service.graph().keyword_names_for_note(note_id).unwrap(),
        names(&["Link"])
    );
}

#[test]
fn patch_touching_link_or_adding_markers_forces_sync() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let original = "Hello [[Link]] world";
    let note_id = create(&service, owner, "Doc", Some(original), false);

    let inside = "Hello [[Zelda]] world";
    service
        .update(note_id, NoteUpdate::patch(make_patch_text(original, inside)))
        .unwrap();
    assert_eq!(service.graph().sync_calls(), 2);
    assert_eq!(
        service.graph().keyword_names_for_note(note_id).unwrap(),
        names(&["Zelda"])
    );
    assert!(service.keywords().get_keyword(owner, "Link").unwrap().is_none());

    let added = "Hello [[Zelda]] world and [[Extra]]";
    let updated = service
        .update(note_id, NoteUpdate::patch(make_patch_text(inside, added)))
        .unwrap();
    assert_eq!(service.graph().sync_calls(), 3);
    assert_eq!(updated.link_intervals.len(), 2);
    assert_eq!(
        service.keywords().note_keyword_names(note_id).unwrap(),
        names(&["Extra", "Zelda"])
    );
}

#[test]
fn full_text_replace_and_untracked_notes_always_sync() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let linked = create(&service, owner, "Linked", Some("Hello [[Link]] world"), false);
    service
        .update(linked, NoteUpdate::full_text("Hello [[Link]] there"))
        .unwrap();
    assert_eq!(service.graph().sync_calls(), 2);

    let plain = create(&service, owner, "Plain", Some("no links"), false);
    service
        .update(
            plain,
            NoteUpdate::patch(make_patch_text("no links", "still no links")),
        )
        .unwrap();
    assert_eq!(service.graph().sync_calls(), 4);
}

#[test]
fn garbage_collection_follows_updates_and_deletes() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let note_id = create(&service, owner, "Reader", Some("[[Apple]] [[Banana]]"), false);
    service
        .update(note_id, NoteUpdate::full_text("[[Banana]] only"))
        .unwrap();
    assert!(service.keywords().get_keyword(owner, "Apple").unwrap().is_none());
    assert!(service.keywords().get_keyword(owner, "Banana").unwrap().is_some());

    let definition = create(&service, owner, "Cherry", None, true);
    service.delete(note_id).unwrap();
    assert!(service.keywords().get_keyword(owner, "Banana").unwrap().is_none());
    assert!(service.keywords().get_keyword(owner, "Cherry").unwrap().is_some());

    service
        .update(
            definition,
            NoteUpdate {
                represents_keyword: FieldUpdate::SetTo(false),
                ..NoteUpdate::default()
            },
        )
        .unwrap();
    assert!(service.keywords().get_keyword(owner, "Cherry").unwrap().is_none());
}

#[test]
fn designation_and_new_links_in_one_update_materialize_both_directions() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let gamma = create(&service, owner, "Gamma", Some("[[Delta]]"), false);
    create(&service, owner, "Delta", Some("[[Gamma]]"), true);

    let update = NoteUpdate {
        text: FieldUpdate::SetTo(TextEdit::Full("[[Delta]] [[Epsilon]]".to_string())),
        represents_keyword: FieldUpdate::SetTo(true),
        ..NoteUpdate::default()
    };
    let updated = service.update(gamma, update).unwrap();
    assert!(updated.is_keyword_note());

    let probe = service.graph();
    assert_eq!(probe.count_links_between(owner, "Delta", "Gamma").unwrap(), 1);
    assert_eq!(probe.count_links_between(owner, "Gamma", "Delta").unwrap(), 1);
    assert_eq!(
        probe.keyword_names_for_note(gamma).unwrap(),
        names(&["Delta", "Epsilon"])
    );

    create(&service, owner, "Selfie", Some("I am [[Selfie]]"), true);
    assert_eq!(probe.count_links_between(owner, "Selfie", "Selfie").unwrap(), 0);
}

#[test]
fn validation_errors_are_reported_before_writes() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    create(&service, owner, "Taken", None, false);
    let duplicate = service
        .create(NewNote {
            owner_id: owner,
            title: Some(" Taken ".to_string()),
            ..NewNote::default()
        })
        .unwrap_err();
    assert!(matches!(duplicate, NoteServiceError::NoteTitleAlreadyExists(title) if title == "Taken"));

    let blank = service
        .create(NewNote {
            owner_id: owner,
            title: Some("   ".to_string()),
            ..NewNote::default()
        })
        .unwrap_err();
    assert!(matches!(blank, NoteServiceError::NoteTitleRequired));

    let blank_keyword = service
        .create(NewNote {
            owner_id: owner,
            title: Some(String::new()),
            represents_keyword: true,
            ..NewNote::default()
        })
        .unwrap_err();
    assert!(matches!(blank_keyword, NoteServiceError::KeywordNoteTitleRequired));

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.update(missing, NoteUpdate::title("x")).unwrap_err(),
        NoteServiceError::NoteNotFound(id) if id == missing
    ));
    assert!(matches!(
        service.delete(missing).unwrap_err(),
        NoteServiceError::NoteNotFound(id) if id == missing
    ));

    let other = create(&service, owner, "Other", None, false);
    let cleared = service
        .update(
            other,
            NoteUpdate {
                title: FieldUpdate::Cleared,
                ..NoteUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(cleared, NoteServiceError::NoteTitleRequired));
    let rename_clash = service.update(other, NoteUpdate::title("Taken")).unwrap_err();
    assert!(matches!(rename_clash, NoteServiceError::NoteTitleAlreadyExists(_)));
    assert_eq!(service.get_note(other).unwrap().unwrap().title, "Other");
}

#[test]
fn second_representing_note_is_rejected() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    service
        .keywords()
        .ensure_keywords(owner, &names(&["Solo"]))
        .unwrap();
    let keyword = service.keywords().get_keyword(owner, "Solo").unwrap().unwrap();
    let mut draft = Note::new(owner, "Solo draft", None);
    draft.represents_keyword_id = Some(keyword.id);
    service.notes().create_note(&draft).unwrap();

    let err = service
        .create(NewNote {
            owner_id: owner,
            title: Some("Solo".to_string()),
            represents_keyword: true,
            ..NewNote::default()
        })
        .unwrap_err();
    assert!(matches!(err, NoteServiceError::KeywordNoteAlreadyExists(name) if name == "Solo"));
    assert_eq!(
        service.notes().count_notes_by_title(owner, "Solo", None).unwrap(),
        0
    );
}

#[test]
fn malformed_patch_is_rejected_and_note_kept() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let note_id = create(&service, owner, "Doc", Some("Hello [[Link]] world"), false);
    let stale = make_patch_text("Completely different body", "Another body");

    for patch in [stale, "@@ not a patch".to_string()] {
        let err = service.update(note_id, NoteUpdate::patch(patch)).unwrap_err();
        assert!(matches!(err, NoteServiceError::PatchApplicationFailed(_)));
    }
    let stored = service.get_note(note_id).unwrap().unwrap();
    assert_eq!(stored.text.as_deref(), Some("Hello [[Link]] world"));
    assert_eq!(service.graph().sync_calls(), 1);
}

#[test]
fn missing_titles_take_smallest_free_untitled_number() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();
    let first = untitled_for(&service, owner);
    let second = untitled_for(&service, owner);
    assert_eq!(service.get_note(first).unwrap().unwrap().title, "Untitled 1");
    assert_eq!(service.get_note(second).unwrap().unwrap().title, "Untitled 2");

    service.delete(first).unwrap();
    let third = untitled_for(&service, owner);
    assert_eq!(service.get_note(third).unwrap().unwrap().title, "Untitled 1");

    let other_owner = untitled_for(&service, Uuid::new_v4());
    assert_eq!(
        service.get_note(other_owner).unwrap().unwrap().title,
        "Untitled 1"
    );
}

fn untitled_for(service: &TestService<'_>, owner: OwnerId) -> NoteId {
    service
        .create(NewNote {
            owner_id: owner,
            ..NewNote::default()
        })
        .unwrap()
}

#[test]
fn list_notes_and_creation_stats_are_owner_scoped() {
    let relational = open_db_in_memory().unwrap();
    let graph = open_graph_db_in_memory().unwrap();
    let service = service(&relational, &graph);
    let owner = Uuid::new_v4();

    let first = create(&service, owner, "First", None, false);
    let second = create(&service, owner, "Second", None, false);
    create(&service, Uuid::new_v4(), "Foreign", None, false);

    relational
        .execute(
            "UPDATE notes SET created_at = 86400000 WHERE uuid = ?1;",
            [first.to_string()],
        )
        .unwrap();
    relational
        .execute(
            "UPDATE notes SET created_at = 172800000 WHERE uuid = ?1;",
            [second.to_string()],
        )
        .unwrap();

    let all: Vec<NoteId> = service
        .list_notes(owner, None, None)
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(all, vec![first, second]);

    let windowed = service.list_notes(owner, Some(100_000_000), None).unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].id, second);

    let stats = service.note_creation_stats(owner).unwrap();
    let days: Vec<(&str, u32)> = stats
        .iter()
        .map(|stat| (stat.date.as_str(), stat.count))
        .collect();
    assert_eq!(days, vec![("1970-01-02", 1), ("1970-01-03", 1)]);
}
