//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for both stores.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations of their schema fully applied.

use super::migrations::{apply_migrations, Schema};
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens the relational store file and applies all pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_schema(Some(path.as_ref()), Schema::Relational)
}

/// Opens an in-memory relational store and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_schema(None, Schema::Relational)
}

/// Opens the graph store file and applies all pending graph migrations.
pub fn open_graph_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_schema(Some(path.as_ref()), Schema::Graph)
}

/// Opens an in-memory graph store and applies all pending graph migrations.
pub fn open_graph_db_in_memory() -> DbResult<Connection> {
    open_schema(None, Schema::Graph)
}

fn open_schema(path: Option<&Path>, schema: Schema) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = if path.is_some() { "file" } else { "memory" };
    info!(
        "event=db_open module=db status=start mode={} schema={}",
        mode,
        schema.as_str()
    );

    let opened = match path {
        Some(path) => Connection::open(path),
        None => Connection::open_in_memory(),
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} schema={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                schema.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, schema) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} schema={} duration_ms={}",
                mode,
                schema.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} schema={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                schema.as_str(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, schema: Schema) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn, schema)?;
    Ok(())
}
