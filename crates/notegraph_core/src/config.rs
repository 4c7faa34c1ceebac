//! Engine configuration shape.
//!
//! Every field has a default, so partial JSON documents deserialize and an
//! empty object yields in-memory stores.

use crate::db::{open_db, open_db_in_memory, open_graph_db, open_graph_db_in_memory, DbResult};
use crate::logging::default_log_level;
use crate::service::note_service::DEFAULT_GRAPH_DEPTH;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Typed engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Relational store file; `None` opens an in-memory database.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Graph store file; `None` opens an in-memory database.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_database_path: Option<PathBuf>,

    #[serde(default = "default_level")]
    pub log_level: String,

    /// Absolute log directory; `None` leaves logging uninitialized.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// BFS depth for seeded graph queries without an explicit depth.
    #[serde(default = "default_graph_depth")]
    pub graph_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            graph_database_path: None,
            log_level: default_level(),
            log_dir: None,
            graph_depth: DEFAULT_GRAPH_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects empty store paths and relative log directories.
    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in [
            ("database_path", &self.database_path),
            ("graph_database_path", &self.graph_database_path),
        ] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(format!("{name} cannot be empty"));
                }
            }
        }

        if let Some(dir) = &self.log_dir {
            if !Path::new(dir.trim()).is_absolute() {
                return Err(format!("log_dir must be an absolute path, got `{dir}`"));
            }
        }
        Ok(())
    }

    /// Opens `(relational, graph)` connections as configured.
    pub fn open_stores(&self) -> DbResult<(Connection, Connection)> {
        let relational = match &self.database_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        let graph = match &self.graph_database_path {
            Some(path) => open_graph_db(path)?,
            None => open_graph_db_in_memory()?,
        };
        Ok((relational, graph))
    }
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn default_graph_depth() -> u32 {
    DEFAULT_GRAPH_DEPTH
}
