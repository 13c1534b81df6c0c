//! Connection bootstrap for catalog databases.
//!
//! # Responsibility
//! - Resolve a library directory or file path to the catalog file.
//! - Open the file read-only and verify the tables the engine depends on.

use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// File name of the catalog inside a library directory.
pub const CATALOG_FILE_NAME: &str = "metadata.db";

const REQUIRED_TABLES: &[&str] = &["books", "preferences"];

/// Resolves `path` to the catalog file.
///
/// A directory resolves to `<dir>/metadata.db`; anything else is taken as the
/// database file itself.
pub fn resolve_catalog_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_dir() {
        path.join(CATALOG_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Opens a catalog database read-only.
///
/// # Side effects
/// - Emits `catalog_open` logging events with duration and status.
///
/// # Errors
/// - [`DbError::CatalogNotFound`] when the resolved file does not exist.
/// - [`DbError::MissingTable`] when the file is not a catalog.
pub fn open_catalog(path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let catalog_path = resolve_catalog_path(path);
    info!(
        "event=catalog_open module=db status=start path={}",
        catalog_path.display()
    );

    if !catalog_path.is_file() {
        error!(
            "event=catalog_open module=db status=error duration_ms={} error_code=catalog_not_found path={}",
            started_at.elapsed().as_millis(),
            catalog_path.display()
        );
        return Err(DbError::CatalogNotFound(catalog_path));
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let conn = match Connection::open_with_flags(&catalog_path, flags) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=catalog_open module=db status=error duration_ms={} error_code=catalog_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn) {
        Ok(()) => {
            info!(
                "event=catalog_open module=db status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=catalog_open module=db status=error duration_ms={} error_code=catalog_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA query_only = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(DbError::MissingTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
