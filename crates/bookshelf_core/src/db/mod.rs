//! Read-only SQLite access to a catalog database.
//!
//! # Responsibility
//! - Open catalog connections in read-only mode.
//! - Reject files that do not look like a book catalog before any query runs.
//!
//! # Invariants
//! - Returned connections never write: the file is opened read-only and
//!   `query_only` is enabled.
//! - Schema is never created or migrated by this crate.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod open;

pub use open::{open_catalog, resolve_catalog_path, CATALOG_FILE_NAME};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The path does not point at an existing catalog file.
    CatalogNotFound(PathBuf),
    /// The database opened but lacks a table every catalog carries.
    MissingTable(&'static str),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::CatalogNotFound(path) => {
                write!(f, "catalog database not found at `{}`", path.display())
            }
            Self::MissingTable(table) => {
                write!(f, "catalog database is missing required table `{table}`")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CatalogNotFound(_) | Self::MissingTable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
