//! Graph store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Mirror notes as graph nodes and maintain typed `has_keyword` /
//!   `links_to` edges derived from wikilinks and keyword designation.
//! - Serve consistency probes and the keyword graph projection.
//!
//! # Invariants
//! - Every write is an idempotent merge: re-issuing `upsert_note`,
//!   `sync_connections` or `delete_note` converges to the same state.
//! - Keyword nodes are keyed by `(owner, name)`; a keyword node without any
//!   incoming `has_keyword` edge is pruned by the write that orphaned it.
//! - Deleting a note node detaches all incident edges (FK cascade).

use crate::db::DbError;
use crate::model::graph::{
    keyword_node_id, keyword_note_node_id, ConnectionKind, GraphConnection, GraphData, GraphNode,
};
use crate::model::note::{KeywordId, Note, NoteId, OwnerId};
use crate::repo::keyword_repo::normalize_names;
use crate::repo::missing_table;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type GraphRepoResult<T> = Result<T, GraphRepoError>;

/// Graph store error.
#[derive(Debug)]
pub enum GraphRepoError {
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for GraphRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted graph data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph repository requires table `{table}`")
            }
        }
    }
}

impl Error for GraphRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for GraphRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GraphRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Graph store interface consumed by the note lifecycle service.
pub trait GraphRepository {
    /// Merges the note node, refreshing title and represented keyword.
    fn upsert_note(&self, note: &Note) -> GraphRepoResult<()>;
    /// Recomputes the note's edges from `targets` and its keyword designation.
    ///
    /// `previous_title` and `previous_represents_keyword_id` describe the note
    /// before the current mutation; both are `None` on create.
    fn sync_connections(
        &self,
        note: &Note,
        targets: &[String],
        previous_title: Option<&str>,
        previous_represents_keyword_id: Option<KeywordId>,
    ) -> GraphRepoResult<()>;
    /// Removes the note node and every incident edge. Absent nodes are a no-op.
    fn delete_note(&self, note_id: NoteId) -> GraphRepoResult<()>;
    /// Counts mirrored notes of `owner_id` titled exactly `title`.
    fn count_notes_by_title(&self, owner_id: OwnerId, title: &str) -> GraphRepoResult<u32>;
    /// Counts direct `links_to` edges plus keywords shared between two titles.
    fn count_links_between(
        &self,
        owner_id: OwnerId,
        from_title: &str,
        to_title: &str,
    ) -> GraphRepoResult<u32>;
    /// Returns the keyword projection, optionally seeded by `query`.
    fn get_graph(
        &self,
        owner_id: OwnerId,
        query: Option<&str>,
        depth: u32,
    ) -> GraphRepoResult<GraphData>;
    /// Keyword names the note has `has_keyword` edges to, sorted by name.
    fn keyword_names_for_note(&self, note_id: NoteId) -> GraphRepoResult<Vec<String>>;
}

/// SQLite-backed graph store.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    /// Constructs a graph repository from a migrated graph connection.
    pub fn try_new(conn: &'conn Connection) -> GraphRepoResult<Self> {
        if let Some(table) = missing_table(
            conn,
            &[
                "graph_notes",
                "graph_keywords",
                "graph_has_keyword",
                "graph_links_to",
            ],
        )? {
            return Err(GraphRepoError::MissingRequiredTable(table));
        }
        Ok(Self { conn })
    }

    fn begin(&self) -> GraphRepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn upsert_note(&self, note: &Note) -> GraphRepoResult<()> {
        merge_note_node(self.conn, note)
    }

    fn sync_connections(
        &self,
        note: &Note,
        targets: &[String],
        previous_title: Option<&str>,
        previous_represents_keyword_id: Option<KeywordId>,
    ) -> GraphRepoResult<()> {
        let note_uuid = note.id.to_string();
        let owner_uuid = note.owner_id.to_string();
        let targets = normalize_names(targets);

        let tx = self.begin()?;
        merge_note_node(&tx, note)?;

        tx.execute(
            "DELETE FROM graph_has_keyword WHERE note_uuid = ?1;",
            [note_uuid.as_str()],
        )?;
        tx.execute(
            "DELETE FROM graph_links_to WHERE source_uuid = ?1;",
            [note_uuid.as_str()],
        )?;

        // Backlinks earned under the old keyword identity are stale.
        if previous_represents_keyword_id.is_some() {
            let old_title = previous_title.unwrap_or(note.title.as_str());
            let lost_designation = note.represents_keyword_id.is_none();
            if lost_designation || old_title != note.title {
                tx.execute(
                    "DELETE FROM graph_links_to
                     WHERE target_uuid = ?1
                       AND source_uuid IN (
                           SELECT hk.note_uuid
                           FROM graph_has_keyword hk
                           WHERE hk.owner_uuid = ?2 AND hk.keyword_name = ?3
                       );",
                    params![note_uuid.as_str(), owner_uuid.as_str(), old_title],
                )?;
            }
        }

        for target in &targets {
            tx.execute(
                "INSERT OR IGNORE INTO graph_keywords (owner_uuid, name) VALUES (?1, ?2);",
                params![owner_uuid.as_str(), target.as_str()],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO graph_has_keyword (note_uuid, owner_uuid, keyword_name)
                 VALUES (?1, ?2, ?3);",
                params![note_uuid.as_str(), owner_uuid.as_str(), target.as_str()],
            )?;
        }

        for target in &targets {
            tx.execute(
                "INSERT OR IGNORE INTO graph_links_to (source_uuid, target_uuid)
                 SELECT ?1, n.note_uuid
                 FROM graph_notes n
                 WHERE n.owner_uuid = ?2
                   AND n.title = ?3
                   AND n.represents_keyword_uuid IS NOT NULL
                   AND n.note_uuid <> ?1;",
                params![note_uuid.as_str(), owner_uuid.as_str(), target.as_str()],
            )?;
        }

        if note.represents_keyword_id.is_some() && !note.title.is_empty() {
            tx.execute(
                "INSERT OR IGNORE INTO graph_links_to (source_uuid, target_uuid)
                 SELECT hk.note_uuid, ?1
                 FROM graph_has_keyword hk
                 WHERE hk.owner_uuid = ?2
                   AND hk.keyword_name = ?3
                   AND hk.note_uuid <> ?1;",
                params![note_uuid.as_str(), owner_uuid.as_str(), note.title.as_str()],
            )?;
        }

        prune_orphan_keywords(&tx, &owner_uuid)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_note(&self, note_id: NoteId) -> GraphRepoResult<()> {
        let note_uuid = note_id.to_string();
        let tx = self.begin()?;
        let owner_uuid: Option<String> = tx
            .query_row(
                "SELECT owner_uuid FROM graph_notes WHERE note_uuid = ?1;",
                [note_uuid.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(owner_uuid) = owner_uuid {
            tx.execute(
                "DELETE FROM graph_notes WHERE note_uuid = ?1;",
                [note_uuid.as_str()],
            )?;
            prune_orphan_keywords(&tx, &owner_uuid)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn count_notes_by_title(&self, owner_id: OwnerId, title: &str) -> GraphRepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM graph_notes WHERE owner_uuid = ?1 AND title = ?2;",
            params![owner_id.to_string(), title],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn count_links_between(
        &self,
        owner_id: OwnerId,
        from_title: &str,
        to_title: &str,
    ) -> GraphRepoResult<u32> {
        let owner_uuid = owner_id.to_string();
        let direct = self.conn.query_row(
            "SELECT COUNT(DISTINCT l.source_uuid || '>' || l.target_uuid)
             FROM graph_links_to l
             INNER JOIN graph_notes s ON s.note_uuid = l.source_uuid
             INNER JOIN graph_notes t ON t.note_uuid = l.target_uuid
             WHERE s.owner_uuid = ?1
               AND t.owner_uuid = ?1
               AND s.title = ?2
               AND t.title = ?3;",
            params![owner_uuid.as_str(), from_title, to_title],
            |row| row.get::<_, u32>(0),
        )?;
        let shared = self.conn.query_row(
            "SELECT COUNT(DISTINCT a.keyword_name)
             FROM graph_has_keyword a
             INNER JOIN graph_notes an ON an.note_uuid = a.note_uuid
             INNER JOIN graph_has_keyword b
                ON b.owner_uuid = a.owner_uuid AND b.keyword_name = a.keyword_name
             INNER JOIN graph_notes bn ON bn.note_uuid = b.note_uuid
             WHERE a.owner_uuid = ?1
               AND an.title = ?2
               AND bn.title = ?3
               AND an.note_uuid <> bn.note_uuid;",
            params![owner_uuid.as_str(), from_title, to_title],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(direct + shared)
    }

    fn get_graph(
        &self,
        owner_id: OwnerId,
        query: Option<&str>,
        depth: u32,
    ) -> GraphRepoResult<GraphData> {
        let full = load_projection(self.conn, owner_id)?;
        let needle = match query.map(str::trim) {
            Some(value) if !value.is_empty() => value.to_lowercase(),
            _ => return Ok(full),
        };

        let seeds: Vec<String> = full
            .nodes
            .iter()
            .filter(|node| node.title().to_lowercase().contains(&needle))
            .map(GraphNode::id)
            .collect();

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for connection in &full.connections {
            adjacency
                .entry(connection.from_id.as_str())
                .or_default()
                .push(connection.to_id.as_str());
            adjacency
                .entry(connection.to_id.as_str())
                .or_default()
                .push(connection.from_id.as_str());
        }

        let mut visited: HashSet<&str> = seeds.iter().map(String::as_str).collect();
        let mut current_level: Vec<&str> = seeds.iter().map(String::as_str).collect();
        for _ in 0..depth {
            let mut next_level = Vec::new();
            for node_id in current_level {
                for neighbor in adjacency.get(node_id).into_iter().flatten() {
                    if visited.insert(*neighbor) {
                        next_level.push(*neighbor);
                    }
                }
            }
            if next_level.is_empty() {
                break;
            }
            current_level = next_level;
        }

        let visited: HashSet<String> = visited.into_iter().map(str::to_string).collect();
        Ok(GraphData {
            nodes: full
                .nodes
                .iter()
                .filter(|node| visited.contains(&node.id()))
                .cloned()
                .collect(),
            connections: full
                .connections
                .iter()
                .filter(|c| visited.contains(&c.from_id) && visited.contains(&c.to_id))
                .cloned()
                .collect(),
        })
    }

    fn keyword_names_for_note(&self, note_id: NoteId) -> GraphRepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT keyword_name
             FROM graph_has_keyword
             WHERE note_uuid = ?1
             ORDER BY keyword_name ASC;",
        )?;
        let mut rows = stmt.query([note_id.to_string()])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }
}

fn merge_note_node(conn: &Connection, note: &Note) -> GraphRepoResult<()> {
    conn.execute(
        "INSERT INTO graph_notes (note_uuid, owner_uuid, title, represents_keyword_uuid)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (note_uuid) DO UPDATE SET
            owner_uuid = excluded.owner_uuid,
            title = excluded.title,
            represents_keyword_uuid = excluded.represents_keyword_uuid;",
        params![
            note.id.to_string(),
            note.owner_id.to_string(),
            note.title.as_str(),
            note.represents_keyword_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

fn prune_orphan_keywords(conn: &Connection, owner_uuid: &str) -> GraphRepoResult<usize> {
    let pruned = conn.execute(
        "DELETE FROM graph_keywords
         WHERE owner_uuid = ?1
           AND NOT EXISTS (
               SELECT 1 FROM graph_has_keyword hk
               WHERE hk.owner_uuid = graph_keywords.owner_uuid
                 AND hk.keyword_name = graph_keywords.name
           );",
        [owner_uuid],
    )?;
    Ok(pruned)
}

/// Loads keyword-note nodes, keyword nodes and the edges among them.
fn load_projection(conn: &Connection, owner_id: OwnerId) -> GraphRepoResult<GraphData> {
    let owner_uuid = owner_id.to_string();
    let mut nodes = Vec::new();
    let mut connections = Vec::new();

    let mut note_ids: BTreeMap<String, String> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT note_uuid, title
             FROM graph_notes
             WHERE owner_uuid = ?1 AND represents_keyword_uuid IS NOT NULL
             ORDER BY title ASC, note_uuid ASC;",
        )?;
        let mut rows = stmt.query([owner_uuid.as_str()])?;
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            let note_id = parse_graph_uuid(&uuid_text)?;
            note_ids.insert(uuid_text, keyword_note_node_id(note_id));
            nodes.push(GraphNode::KeywordNote {
                note_id,
                title: row.get(1)?,
            });
        }
    }

    {
        let mut stmt = conn.prepare(
            "SELECT
                k.name,
                EXISTS(
                    SELECT 1 FROM graph_notes n
                    WHERE n.owner_uuid = k.owner_uuid
                      AND n.title = k.name
                      AND n.represents_keyword_uuid IS NOT NULL
                ) AS represented
             FROM graph_keywords k
             WHERE k.owner_uuid = ?1
             ORDER BY k.name ASC;",
        )?;
        let mut rows = stmt.query([owner_uuid.as_str()])?;
        while let Some(row) = rows.next()? {
            nodes.push(GraphNode::Keyword {
                title: row.get(0)?,
                has_representing_note: row.get::<_, i64>(1)? == 1,
            });
        }
    }

    {
        let mut stmt = conn.prepare(
            "SELECT hk.note_uuid, hk.keyword_name
             FROM graph_has_keyword hk
             INNER JOIN graph_notes n ON n.note_uuid = hk.note_uuid
             WHERE hk.owner_uuid = ?1 AND n.represents_keyword_uuid IS NOT NULL
             ORDER BY n.title ASC, hk.keyword_name ASC;",
        )?;
        let mut rows = stmt.query([owner_uuid.as_str()])?;
        while let Some(row) = rows.next()? {
            let source: String = row.get(0)?;
            let keyword: String = row.get(1)?;
            if let Some(from_id) = note_ids.get(&source) {
                connections.push(GraphConnection {
                    from_id: from_id.clone(),
                    to_id: keyword_node_id(&keyword),
                    kind: ConnectionKind::HasKeyword,
                });
            }
        }
    }

    {
        let mut stmt = conn.prepare(
            "SELECT l.source_uuid, l.target_uuid
             FROM graph_links_to l
             INNER JOIN graph_notes s ON s.note_uuid = l.source_uuid
             INNER JOIN graph_notes t ON t.note_uuid = l.target_uuid
             WHERE s.owner_uuid = ?1
               AND s.represents_keyword_uuid IS NOT NULL
               AND t.represents_keyword_uuid IS NOT NULL
             ORDER BY s.title ASC, t.title ASC;",
        )?;
        let mut rows = stmt.query([owner_uuid.as_str()])?;
        while let Some(row) = rows.next()? {
            let source: String = row.get(0)?;
            let target: String = row.get(1)?;
            if let (Some(from_id), Some(to_id)) = (note_ids.get(&source), note_ids.get(&target)) {
                connections.push(GraphConnection {
                    from_id: from_id.clone(),
                    to_id: to_id.clone(),
                    kind: ConnectionKind::LinksTo,
                });
            }
        }
    }

    Ok(GraphData { nodes, connections })
}

fn parse_graph_uuid(value: &str) -> GraphRepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        GraphRepoError::InvalidData(format!("invalid uuid value `{value}` in graph_notes.note_uuid"))
    })
}
