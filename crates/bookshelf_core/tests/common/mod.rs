//! Shared catalog fixture for integration tests.
//!
//! Builds a small catalog with the on-disk layout of a real library in a
//! temporary directory, plus seeding helpers.

#![allow(dead_code)]

use bookshelf_core::Library;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use tempfile::TempDir;

pub const LIBRARY_NAME: &str = "Main";

const SCHEMA_SQL: &str = r#"
CREATE TABLE books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT 'Unknown',
    sort TEXT,
    timestamp TIMESTAMP,
    pubdate TIMESTAMP,
    series_index REAL NOT NULL DEFAULT 1.0,
    author_sort TEXT,
    path TEXT NOT NULL DEFAULT '',
    uuid TEXT,
    has_cover BOOL DEFAULT 0,
    last_modified TIMESTAMP NOT NULL DEFAULT '2000-01-01 00:00:00+00:00'
);
CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL, sort TEXT);
CREATE TABLE books_authors_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, author INTEGER NOT NULL);
CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE books_tags_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, tag INTEGER NOT NULL);
CREATE TABLE series (id INTEGER PRIMARY KEY, name TEXT NOT NULL, sort TEXT);
CREATE TABLE books_series_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, series INTEGER NOT NULL);
CREATE TABLE publishers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, sort TEXT);
CREATE TABLE books_publishers_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, publisher INTEGER NOT NULL);
CREATE TABLE ratings (id INTEGER PRIMARY KEY, rating INTEGER);
CREATE TABLE books_ratings_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, rating INTEGER NOT NULL);
CREATE TABLE languages (id INTEGER PRIMARY KEY, lang_code TEXT NOT NULL);
CREATE TABLE books_languages_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, lang_code INTEGER NOT NULL, item_order INTEGER NOT NULL DEFAULT 0);
CREATE TABLE data (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, format TEXT NOT NULL, uncompressed_size INTEGER NOT NULL DEFAULT 0, name TEXT NOT NULL DEFAULT '');
CREATE TABLE identifiers (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, type TEXT NOT NULL DEFAULT 'isbn', val TEXT NOT NULL);
CREATE TABLE comments (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, text TEXT NOT NULL);
CREATE TABLE preferences (id INTEGER PRIMARY KEY, key TEXT NOT NULL UNIQUE, val TEXT NOT NULL);
CREATE TABLE custom_columns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    name TEXT NOT NULL,
    datatype TEXT NOT NULL,
    mark_for_delete BOOL DEFAULT 0 NOT NULL,
    editable BOOL DEFAULT 1 NOT NULL,
    display TEXT DEFAULT '{}' NOT NULL,
    is_multiple BOOL DEFAULT 0 NOT NULL,
    normalized BOOL NOT NULL
);
CREATE TABLE custom_column_1 (id INTEGER PRIMARY KEY, value TEXT NOT NULL);
CREATE TABLE books_custom_column_1_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, value INTEGER NOT NULL);
CREATE TABLE custom_column_2 (id INTEGER PRIMARY KEY, book INTEGER, value INTEGER NOT NULL);
CREATE TABLE custom_column_3 (id INTEGER PRIMARY KEY, value TEXT NOT NULL);
CREATE TABLE books_custom_column_3_link (id INTEGER PRIMARY KEY, book INTEGER NOT NULL, value INTEGER NOT NULL, extra REAL);

INSERT INTO custom_columns (id, label, name, datatype, is_multiple, normalized)
VALUES (1, 'genre', 'Genre', 'text', 1, 1),
       (2, 'pages', 'Pages', 'int', 0, 0),
       (3, 'saga', 'Saga', 'series', 0, 1),
       (4, 'shelfmark', 'Shelfmark', 'composite', 0, 0);
INSERT INTO custom_columns (id, label, name, datatype, is_multiple, normalized, mark_for_delete)
VALUES (5, 'retired', 'Retired', 'text', 0, 1, 1);
"#;

/// `field_metadata` preference describing the fixture's custom columns.
pub const FIELD_METADATA_JSON: &str = r##"{
    "authors": {"table": "authors", "column": "name", "datatype": "text",
        "is_multiple": {"cache_to_list": ",", "ui_to_list": "&", "list_to_ui": " & "},
        "is_custom": false, "is_category": true},
    "#genre": {"table": "custom_column_1", "column": "value", "datatype": "text",
        "is_multiple": {"cache_to_list": "|", "ui_to_list": ",", "list_to_ui": ", "},
        "label": "genre", "name": "Genre", "colnum": 1, "is_custom": true, "is_category": true},
    "#pages": {"table": "custom_column_2", "column": "value", "datatype": "int",
        "is_multiple": {}, "label": "pages", "name": "Pages", "colnum": 2,
        "is_custom": true, "is_category": false},
    "#saga": {"table": "custom_column_3", "column": "value", "datatype": "series",
        "is_multiple": {}, "label": "saga", "name": "Saga", "colnum": 3,
        "is_custom": true, "is_category": true},
    "#shelfmark": {"table": "custom_column_4", "column": "value", "datatype": "composite",
        "is_multiple": {}, "label": "shelfmark", "name": "Shelfmark", "colnum": 4,
        "is_custom": true, "is_category": false}
}"##;

/// A catalog living in its own temporary library directory.
pub struct Catalog {
    dir: TempDir,
}

impl Catalog {
    pub fn dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("metadata.db")
    }

    /// Writable connection for seeding; drop it before opening a library.
    pub fn writer(&self) -> Connection {
        Connection::open(self.db_path()).unwrap()
    }

    pub fn open_library(&self) -> Library {
        Library::open(LIBRARY_NAME, self.dir.path()).unwrap()
    }
}

/// Empty catalog with schema, preferences and custom-column definitions.
pub fn catalog() -> Catalog {
    catalog_with_field_metadata(FIELD_METADATA_JSON)
}

pub fn catalog_with_field_metadata(field_metadata: &str) -> Catalog {
    let catalog = Catalog {
        dir: tempfile::tempdir().unwrap(),
    };
    let conn = catalog.writer();
    conn.execute_batch(SCHEMA_SQL).unwrap();
    set_preference(&conn, "field_metadata", field_metadata);
    set_preference(&conn, "tag_browser_hidden_categories", r#"["formats"]"#);
    set_preference(&conn, "saved_searches", r#"{"unread": "tags:\"=unread\""}"#);
    catalog
}

pub fn set_preference(conn: &Connection, key: &str, val: &str) {
    conn.execute(
        "INSERT INTO preferences (key, val) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET val = excluded.val",
        params![key, val],
    )
    .unwrap();
}

pub fn add_book(conn: &Connection, id: i64, title: &str, timestamp: &str) {
    conn.execute(
        "INSERT INTO books (id, title, sort, timestamp, pubdate, path, uuid)
         VALUES (?1, ?2, ?2, ?3, ?3, ?4, ?5)",
        params![id, title, timestamp, format!("books/{id}"), format!("uuid-{id}")],
    )
    .unwrap();
}

pub fn add_tag(conn: &Connection, id: i64, name: &str) {
    conn.execute("INSERT INTO tags (id, name) VALUES (?1, ?2)", params![id, name])
        .unwrap();
}

pub fn tag_book(conn: &Connection, book: i64, tag: i64) {
    conn.execute(
        "INSERT INTO books_tags_link (book, tag) VALUES (?1, ?2)",
        params![book, tag],
    )
    .unwrap();
}

/// `count` books, ids `1..=count`, all tagged `tag`; later ids were added later.
pub fn seed_tagged_books(conn: &Connection, tag: i64, count: i64) {
    add_tag(conn, tag, "tagged");
    for id in 1..=count {
        let timestamp = format!("2021-01-01 {:02}:{:02}:00+00:00", id / 60, id % 60);
        add_book(conn, id, &format!("Book {id:03}"), &timestamp);
        tag_book(conn, id, tag);
    }
}

/// Three books exercising every built-in and custom relation.
///
/// - 1 `Dune`: Frank Herbert; tags `sci-fi, classic`; series Dune; EPUB+MOBI.
/// - 2 `Dune Messiah`: Frank Herbert; tag `sci-fi`; saga `Arrakis Cycle` at 2.
/// - 3 `Good Omens`: Terry Pratchett & Neil Gaiman; tag `fantasy`.
pub fn seed_sample_books(conn: &Connection) {
    add_book(conn, 1, "Dune", "2020-01-01 00:00:00+00:00");
    add_book(conn, 2, "Dune Messiah", "2020-02-01 00:00:00+00:00");
    add_book(conn, 3, "Good Omens", "2020-03-01 00:00:00+00:00");

    conn.execute_batch(
        "UPDATE books SET author_sort = 'Herbert, Frank', has_cover = 1 WHERE id IN (1, 2);
         UPDATE books SET author_sort = 'Pratchett, Terry' WHERE id = 3;
         UPDATE books SET series_index = 2.0 WHERE id = 2;

         INSERT INTO authors (id, name, sort) VALUES
             (1, 'Frank Herbert', 'Herbert, Frank'),
             (2, 'Terry Pratchett', 'Pratchett, Terry'),
             (3, 'Neil Gaiman', 'Gaiman, Neil');
         INSERT INTO books_authors_link (id, book, author) VALUES (1, 1, 1), (2, 2, 1), (3, 3, 2), (4, 3, 3);

         INSERT INTO tags (id, name) VALUES (1, 'sci-fi'), (2, 'classic'), (3, 'fantasy');
         INSERT INTO books_tags_link (id, book, tag) VALUES (1, 1, 1), (2, 1, 2), (3, 2, 1), (4, 3, 3);

         INSERT INTO series (id, name, sort) VALUES (1, 'Dune', 'Dune');
         INSERT INTO books_series_link (id, book, series) VALUES (1, 1, 1), (2, 2, 1);

         INSERT INTO publishers (id, name, sort) VALUES (1, 'Ace', 'Ace');
         INSERT INTO books_publishers_link (id, book, publisher) VALUES (1, 1, 1);

         INSERT INTO ratings (id, rating) VALUES (1, 10);
         INSERT INTO books_ratings_link (id, book, rating) VALUES (1, 1, 1);

         INSERT INTO languages (id, lang_code) VALUES (1, 'eng');
         INSERT INTO books_languages_link (id, book, lang_code) VALUES (1, 1, 1), (2, 2, 1), (3, 3, 1);

         INSERT INTO data (id, book, format, name) VALUES (1, 1, 'EPUB', 'Dune'), (2, 1, 'MOBI', 'Dune');
         INSERT INTO identifiers (id, book, type, val) VALUES (1, 1, 'isbn', '9780441013593');
         INSERT INTO comments (id, book, text) VALUES (1, 1, 'Spice.');

         INSERT INTO custom_column_1 (id, value) VALUES (1, 'space opera'), (2, 'satire');
         INSERT INTO books_custom_column_1_link (id, book, value) VALUES (1, 1, 1), (2, 3, 2);
         INSERT INTO custom_column_2 (id, book, value) VALUES (1, 1, 412);
         INSERT INTO custom_column_3 (id, value) VALUES (1, 'Arrakis Cycle');
         INSERT INTO books_custom_column_3_link (id, book, value, extra) VALUES (1, 2, 1, 2.0);",
    )
    .unwrap();
}

/// Catalog seeded with [`seed_sample_books`], opened as a library.
pub fn sample_library() -> (Catalog, Library) {
    let catalog = catalog();
    {
        let conn = catalog.writer();
        seed_sample_books(&conn);
    }
    let library = catalog.open_library();
    (catalog, library)
}
