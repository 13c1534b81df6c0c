//! Catalog repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Execute statements produced by the query builder.
//! - Flatten result rows into string records.
//!
//! # Invariants
//! - This is the only module that runs SQL against a catalog.
//! - Reads never mask storage failures; every SQLite error is returned.

use crate::db::DbError;
use crate::model::envelope::Record;
use crate::query::statement::Statement;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read-only access to one catalog.
pub trait CatalogRepository {
    /// Raw `(key, val)` rows of the `preferences` table.
    fn load_preferences(&self) -> RepoResult<Vec<(String, String)>>;
    /// Rows as string records keyed by column label.
    fn fetch_records(&self, statement: &Statement) -> RepoResult<Vec<Record>>;
    /// First column of the first row as a count.
    fn fetch_count(&self, statement: &Statement) -> RepoResult<u64>;
    /// First column of every row as an id.
    fn fetch_ids(&self, statement: &Statement) -> RepoResult<Vec<i64>>;
    /// First column of the first row parsed as JSON.
    fn fetch_json(&self, statement: &Statement) -> RepoResult<JsonValue>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn load_preferences(&self) -> RepoResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, val FROM preferences ORDER BY key;")?;
        let mut rows = stmt.query([])?;
        let mut preferences = Vec::new();
        while let Some(row) = rows.next()? {
            preferences.push((row.get("key")?, row.get("val")?));
        }
        Ok(preferences)
    }

    fn fetch_records(&self, statement: &Statement) -> RepoResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let labels = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut rows = stmt.query(params_from_iter(statement.args.iter()))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record(row, &labels)?);
        }

        Ok(records)
    }

    fn fetch_count(&self, statement: &Statement) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            &statement.sql,
            params_from_iter(statement.args.iter()),
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn fetch_ids(&self, statement: &Statement) -> RepoResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let mut rows = stmt.query(params_from_iter(statement.args.iter()))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn fetch_json(&self, statement: &Statement) -> RepoResult<JsonValue> {
        let raw: Option<String> = self.conn.query_row(
            &statement.sql,
            params_from_iter(statement.args.iter()),
            |row| row.get(0),
        )?;
        match raw {
            Some(text) => serde_json::from_str(&text)
                .map_err(|err| RepoError::InvalidData(format!("aggregated json: {err}"))),
            None => Ok(JsonValue::Null),
        }
    }
}

fn parse_record(row: &Row<'_>, labels: &[String]) -> RepoResult<Record> {
    let mut record = Record::new();
    for (index, label) in labels.iter().enumerate() {
        record.insert(label.clone(), flatten_value(row.get_ref(index)?)?);
    }
    Ok(record)
}

fn flatten_value(value: ValueRef<'_>) -> RepoResult<Option<String>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(number) => Ok(Some(number.to_string())),
        ValueRef::Real(number) => Ok(Some(number.to_string())),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|text| Some(text.to_string()))
            .map_err(|err| RepoError::InvalidData(format!("non-utf8 text column: {err}"))),
        ValueRef::Blob(_) => Err(RepoError::InvalidData(
            "blob columns cannot be rendered".to_string(),
        )),
    }
}
