//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations for the relational and graph stores in
//!   strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within one schema.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const RELATIONAL_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_notes_keywords.sql"),
}];

const GRAPH_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("graph_0001_init.sql"),
}];

/// Database schema served by one SQLite connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Notes, keywords and note/keyword associations.
    Relational,
    /// Graph nodes and typed edges mirrored from the relational store.
    Graph,
}

impl Schema {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Graph => "graph",
        }
    }

    fn migrations(self) -> &'static [Migration] {
        match self {
            Self::Relational => RELATIONAL_MIGRATIONS,
            Self::Graph => GRAPH_MIGRATIONS,
        }
    }
}

/// Returns the latest relational migration version known by this binary.
pub fn latest_version() -> u32 {
    latest_schema_version(Schema::Relational)
}

/// Returns the latest migration version of `schema`.
pub fn latest_schema_version(schema: Schema) -> u32 {
    schema
        .migrations()
        .last()
        .map_or(0, |migration| migration.version)
}

/// Applies all pending migrations of `schema` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_schema_version(schema);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in schema.migrations() {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
