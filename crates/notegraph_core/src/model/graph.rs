//! Graph projection model.
//!
//! # Responsibility
//! - Define the node/edge shapes returned by graph queries.
//!
//! # Invariants
//! - Node ids are `keyword:<name>` or `keyword_note:<note uuid>`.
//! - A connection always starts at a keyword-note node.

use crate::model::note::NoteId;
use serde::{Deserialize, Serialize};

const KEYWORD_ID_PREFIX: &str = "keyword:";
const KEYWORD_NOTE_ID_PREFIX: &str = "keyword_note:";

/// Node of the keyword graph projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphNode {
    /// Concept referenced by wikilinks.
    Keyword {
        title: String,
        has_representing_note: bool,
    },
    /// Note that canonically defines a keyword.
    KeywordNote { note_id: NoteId, title: String },
}

impl GraphNode {
    /// Stable projection id of this node.
    pub fn id(&self) -> String {
        match self {
            Self::Keyword { title, .. } => keyword_node_id(title),
            Self::KeywordNote { note_id, .. } => keyword_note_node_id(*note_id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Keyword { title, .. } | Self::KeywordNote { title, .. } => title,
        }
    }
}

/// Edge kind between graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Note text links to a keyword.
    HasKeyword,
    /// Note links to the note representing a linked keyword.
    LinksTo,
}

impl ConnectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HasKeyword => "has_keyword",
            Self::LinksTo => "links_to",
        }
    }
}

/// Directed edge of the graph projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphConnection {
    pub from_id: String,
    pub to_id: String,
    pub kind: ConnectionKind,
}

/// Graph query result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub connections: Vec<GraphConnection>,
}

impl GraphData {
    /// Finds a node by projection id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub fn has_connection(&self, from_id: &str, to_id: &str, kind: ConnectionKind) -> bool {
        self.connections
            .iter()
            .any(|c| c.from_id == from_id && c.to_id == to_id && c.kind == kind)
    }
}

pub fn keyword_node_id(name: &str) -> String {
    format!("{KEYWORD_ID_PREFIX}{name}")
}

pub fn keyword_note_node_id(note_id: NoteId) -> String {
    format!("{KEYWORD_NOTE_ID_PREFIX}{note_id}")
}

#[cfg(test)]
mod tests {
    use super::{ConnectionKind, GraphNode};
    use uuid::Uuid;

    #[test]
    fn node_ids_use_kind_prefix() {
        let keyword = GraphNode::Keyword {
            title: "Orphan".to_string(),
            has_representing_note: false,
        };
        assert_eq!(keyword.id(), "keyword:Orphan");

        let note_id = Uuid::new_v4();
        let note = GraphNode::KeywordNote {
            note_id,
            title: "Alpha".to_string(),
        };
        assert_eq!(note.id(), format!("keyword_note:{note_id}"));
        assert_eq!(note.title(), "Alpha");
    }

    #[test]
    fn connection_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionKind::HasKeyword).unwrap();
        assert_eq!(json, "\"has_keyword\"");
        assert_eq!(ConnectionKind::LinksTo.as_str(), "links_to");
    }
}
