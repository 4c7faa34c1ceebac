//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for notes, keywords and
//!   the graph projection.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories are constructed only over connections whose schema has
//!   the tables they query (`try_new` readiness check).
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod graph_repo;
pub mod keyword_repo;
pub mod note_repo;

use rusqlite::Connection;

/// Returns the first table of `tables` absent from the connection schema.
pub(crate) fn missing_table(
    conn: &Connection,
    tables: &[&'static str],
) -> rusqlite::Result<Option<&'static str>> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Ok(Some(table));
        }
    }
    Ok(None)
}
