//! Declarative catalog schema knowledge.
//!
//! # Responsibility
//! - List built-in fields with their storage shape and sort expression.
//! - Map custom-column datatypes to their storage shape.
//!
//! # Invariants
//! - This module is the only place that names catalog tables.
//! - Every table or column name interpolated into SQL is either a literal
//!   from this module or has passed [`is_plain_identifier`].

use crate::model::field::{ColumnSource, Field, FieldKind, Link, Relation};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

pub const URI_FIELD: &str = "uri";
pub const CUSTOM_COLUMNS_FIELD: &str = "customColumns";

/// Whether `value` can be interpolated into SQL as a bare identifier.
pub fn is_plain_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Alias of the derived table a relational field is joined through.
pub fn relation_alias(json_label: &str) -> String {
    format!("\"r_{json_label}\"")
}

/// Sort expression of a relational field: the smallest member value with
/// its stored type, so numeric columns order numerically.
pub fn relation_sort_key(json_label: &str) -> String {
    format!("{}.sort_key", relation_alias(json_label))
}

#[derive(Debug, Clone, Copy)]
struct RelationSpec {
    table: &'static str,
    value: &'static str,
    /// `(link table, link column)`; `None` for per-book tables.
    link: Option<(&'static str, &'static str)>,
}

impl RelationSpec {
    fn to_relation(self) -> Relation {
        Relation {
            table: self.table.to_string(),
            value: self.value.to_string(),
            link: self.link.map(|(table, column)| Link {
                table: table.to_string(),
                column: column.to_string(),
            }),
            position: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Column(&'static str),
    Item(RelationSpec),
    Category { relation: RelationSpec, names: bool },
}

#[derive(Debug, Clone, Copy)]
struct BuiltinField {
    json_label: &'static str,
    storage_label: &'static str,
    shape: Shape,
    /// `None` sorts relational fields by their joined value.
    sort_column: Option<&'static str>,
    is_category: bool,
    datatype: &'static str,
}

const fn column(
    json_label: &'static str,
    column: &'static str,
    sort_column: &'static str,
    datatype: &'static str,
) -> BuiltinField {
    BuiltinField {
        json_label,
        storage_label: column,
        shape: Shape::Column(column),
        sort_column: Some(sort_column),
        is_category: false,
        datatype,
    }
}

const fn linked(
    table: &'static str,
    value: &'static str,
    link_table: &'static str,
    link_column: &'static str,
) -> RelationSpec {
    RelationSpec {
        table,
        value,
        link: Some((link_table, link_column)),
    }
}

const fn per_book(table: &'static str, value: &'static str) -> RelationSpec {
    RelationSpec {
        table,
        value,
        link: None,
    }
}

const BUILTIN_FIELDS: &[BuiltinField] = &[
    column("id", "id", "books.id", "int"),
    column("title", "title", "books.sort", "text"),
    column("titleSort", "sort", "books.sort", "text"),
    column("authorSort", "author_sort", "books.author_sort", "text"),
    column("added", "timestamp", "books.timestamp", "datetime"),
    column("published", "pubdate", "books.pubdate", "datetime"),
    column("lastModified", "last_modified", "books.last_modified", "datetime"),
    column("seriesIndex", "series_index", "books.series_index", "float"),
    column("path", "path", "books.path", "text"),
    column("uuid", "uuid", "books.uuid", "text"),
    column("hasCover", "has_cover", "books.has_cover", "bool"),
    BuiltinField {
        json_label: "authors",
        storage_label: "authors",
        shape: Shape::Category {
            relation: linked("authors", "authors.name", "books_authors_link", "author"),
            names: true,
        },
        sort_column: Some("books.author_sort"),
        is_category: true,
        datatype: "text",
    },
    BuiltinField {
        json_label: "tags",
        storage_label: "tags",
        shape: Shape::Category {
            relation: linked("tags", "tags.name", "books_tags_link", "tag"),
            names: false,
        },
        sort_column: None,
        is_category: true,
        datatype: "text",
    },
    BuiltinField {
        json_label: "languages",
        storage_label: "languages",
        shape: Shape::Category {
            relation: linked(
                "languages",
                "languages.lang_code",
                "books_languages_link",
                "lang_code",
            ),
            names: false,
        },
        sort_column: None,
        is_category: true,
        datatype: "text",
    },
    BuiltinField {
        json_label: "formats",
        storage_label: "formats",
        shape: Shape::Category {
            relation: per_book("data", "data.format"),
            names: false,
        },
        sort_column: None,
        is_category: true,
        datatype: "text",
    },
    BuiltinField {
        json_label: "identifiers",
        storage_label: "identifiers",
        shape: Shape::Category {
            relation: per_book(
                "identifiers",
                "identifiers.type || ':' || identifiers.val",
            ),
            names: false,
        },
        sort_column: None,
        is_category: true,
        datatype: "text",
    },
    BuiltinField {
        json_label: "series",
        storage_label: "series",
        shape: Shape::Item(linked("series", "series.name", "books_series_link", "series")),
        sort_column: None,
        is_category: true,
        datatype: "series",
    },
    BuiltinField {
        json_label: "publisher",
        storage_label: "publisher",
        shape: Shape::Item(linked(
            "publishers",
            "publishers.name",
            "books_publishers_link",
            "publisher",
        )),
        sort_column: None,
        is_category: true,
        datatype: "text",
    },
    BuiltinField {
        json_label: "rating",
        storage_label: "rating",
        shape: Shape::Item(linked(
            "ratings",
            "ratings.rating",
            "books_ratings_link",
            "rating",
        )),
        sort_column: None,
        is_category: true,
        datatype: "rating",
    },
    BuiltinField {
        json_label: "comments",
        storage_label: "comments",
        shape: Shape::Item(per_book("comments", "comments.text")),
        sort_column: None,
        is_category: false,
        datatype: "comments",
    },
];

/// Built-in fields, including the synthetic `uri` and `customColumns`.
pub fn builtin_fields() -> Vec<Field> {
    let mut fields = BUILTIN_FIELDS
        .iter()
        .map(|builtin| {
            let (kind, is_multiple, is_names_join) = match builtin.shape {
                Shape::Column(name) => {
                    (FieldKind::Column(ColumnSource::Books(name.to_string())), false, false)
                }
                Shape::Item(relation) => (FieldKind::Item(relation.to_relation()), false, false),
                Shape::Category { relation, names } => {
                    (FieldKind::Category(relation.to_relation()), true, names)
                }
            };
            Field {
                json_label: builtin.json_label.to_string(),
                storage_label: builtin.storage_label.to_string(),
                kind,
                is_multiple,
                is_names_join,
                sort_column: builtin.sort_column.map_or_else(
                    || relation_sort_key(builtin.json_label),
                    str::to_string,
                ),
                is_custom: false,
                is_category: builtin.is_category,
                is_hidden: false,
                datatype: builtin.datatype.to_string(),
            }
        })
        .collect::<Vec<_>>();

    fields.push(synthetic(URI_FIELD, ColumnSource::BookUri));
    fields.push(synthetic(CUSTOM_COLUMNS_FIELD, ColumnSource::Metadata));
    fields
}

fn synthetic(label: &str, source: ColumnSource) -> Field {
    Field {
        json_label: label.to_string(),
        storage_label: label.to_string(),
        kind: FieldKind::Column(source),
        is_multiple: false,
        is_names_join: false,
        sort_column: "books.id".to_string(),
        is_custom: false,
        is_category: false,
        is_hidden: false,
        datatype: "composite".to_string(),
    }
}

/// How a custom column of a given datatype is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomStorage {
    /// Value table plus `books_custom_column_N_link`; `positioned` adds the
    /// link's `extra` column.
    Normalized { positioned: bool },
    /// `custom_column_N` holding `book` and `value` directly.
    PerBook,
    /// Computed at display time; nothing to query.
    Unstored,
}

/// Storage shape for a custom-column datatype; `None` for unknown datatypes.
pub fn custom_storage(datatype: &str) -> Option<CustomStorage> {
    match datatype {
        "text" | "enumeration" | "rating" => Some(CustomStorage::Normalized { positioned: false }),
        "series" => Some(CustomStorage::Normalized { positioned: true }),
        "comments" | "int" | "float" | "bool" | "datetime" => Some(CustomStorage::PerBook),
        "composite" => Some(CustomStorage::Unstored),
        _ => None,
    }
}

/// Relation of a stored custom column backed by `table`.
///
/// `table` must already have passed [`is_plain_identifier`].
pub fn custom_relation(table: &str, storage: CustomStorage) -> Option<Relation> {
    match storage {
        CustomStorage::Normalized { positioned } => Some(Relation {
            table: table.to_string(),
            value: format!("{table}.value"),
            link: Some(Link {
                table: format!("books_{table}_link"),
                column: "value".to_string(),
            }),
            position: positioned.then(|| "extra".to_string()),
        }),
        CustomStorage::PerBook => Some(Relation {
            table: table.to_string(),
            value: format!("{table}.value"),
            link: None,
            position: None,
        }),
        CustomStorage::Unstored => None,
    }
}
