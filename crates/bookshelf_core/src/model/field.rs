//! Field model shared by the registry, query builder and descriptor views.
//!
//! # Responsibility
//! - Describe one queryable attribute of a book and how it is stored.
//! - Own the value-joining rules for multi-valued fields.
//!
//! # Invariants
//! - Every field has exactly one [`FieldKind`].
//! - Only `Item` and `Category` fields carry a [`Relation`], so only they can
//!   declare a join table.

use serde::Serialize;

/// Separator for name-like multi values (`Ann & Bo`).
pub const NAMES_SEPARATOR: &str = " & ";
/// Separator for every other multi value (`sci-fi, ya`).
pub const GENERIC_SEPARATOR: &str = ", ";

/// Where a scalar column field reads its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// A column on the `books` table.
    Books(String),
    /// Relative URI of the book resource, computed from `books.id`.
    BookUri,
    /// Catalog-level metadata with no per-book value.
    Metadata,
}

/// Link table connecting `books` to a value table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// e.g. `books_authors_link`.
    pub table: String,
    /// Column in the link table that references the value table id.
    pub column: String,
}

/// Storage shape of a relational field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Table holding the values.
    pub table: String,
    /// SQL expression over `table` rendered as the value.
    pub value: String,
    /// Link table; `None` when `table` carries a `book` column itself.
    pub link: Option<Link>,
    /// Column on the link table holding a position (custom series index).
    pub position: Option<String>,
}

impl Relation {
    /// Table joined against `books`.
    pub fn join_table(&self) -> &str {
        self.link
            .as_ref()
            .map_or(self.table.as_str(), |link| link.table.as_str())
    }

    /// Column of [`Relation::join_table`] matched against the value table.
    ///
    /// Per-book tables are matched on their `book` column instead.
    pub fn join_column(&self) -> &str {
        self.link
            .as_ref()
            .map_or("book", |link| link.column.as_str())
    }
}

/// Structural kind of a field. The set is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Column(ColumnSource),
    /// At most one related value per book.
    Item(Relation),
    /// Any number of related values per book.
    Category(Relation),
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Column(_) => "column",
            Self::Item(_) => "item",
            Self::Category(_) => "category",
        }
    }
}

/// One queryable/returnable book attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Public name used in URLs and records.
    pub json_label: String,
    /// Name in the catalog; custom fields keep their `#` marker.
    pub storage_label: String,
    pub kind: FieldKind,
    pub is_multiple: bool,
    /// Join multiple values with [`NAMES_SEPARATOR`].
    pub is_names_join: bool,
    /// SQL expression used when sorting books by this field.
    pub sort_column: String,
    pub is_custom: bool,
    /// Browsable as a `/<category>` endpoint.
    pub is_category: bool,
    /// Listed in the catalog's hidden-category preference.
    pub is_hidden: bool,
    pub datatype: String,
}

impl Field {
    /// Relation of relational fields, `None` for columns.
    pub fn relation(&self) -> Option<&Relation> {
        match &self.kind {
            FieldKind::Column(_) => None,
            FieldKind::Item(relation) | FieldKind::Category(relation) => Some(relation),
        }
    }

    /// Table the value lives in.
    pub fn table(&self) -> &str {
        match &self.kind {
            FieldKind::Column(ColumnSource::Metadata) => "custom_columns",
            FieldKind::Column(_) => "books",
            FieldKind::Item(relation) | FieldKind::Category(relation) => &relation.table,
        }
    }

    pub fn join_table(&self) -> Option<&str> {
        self.relation().map(Relation::join_table)
    }

    pub fn join_column(&self) -> Option<&str> {
        self.relation().map(Relation::join_column)
    }

    /// Whether the field produces a value in book records.
    pub fn is_projectable(&self) -> bool {
        !matches!(self.kind, FieldKind::Column(ColumnSource::Metadata))
    }

    /// Separator used to join multiple values of this field.
    pub fn separator(&self) -> &'static str {
        if self.is_names_join {
            NAMES_SEPARATOR
        } else {
            GENERIC_SEPARATOR
        }
    }

    /// Joins member values the way book records render them.
    pub fn join_values<S: AsRef<str>>(&self, values: &[S]) -> String {
        values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(self.separator())
    }

    /// Serializable view for field-metadata discovery calls.
    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            json_label: self.json_label.clone(),
            storage_label: self.storage_label.clone(),
            kind: self.kind.label(),
            is_multiple: self.is_multiple,
            is_names_join: self.is_names_join,
            sort_column: self.sort_column.clone(),
            table: self.table().to_string(),
            join_table: self.join_table().map(str::to_string),
            join_column: self.join_column().map(str::to_string),
            is_custom: self.is_custom,
            is_category: self.is_category,
            is_hidden: self.is_hidden,
            datatype: self.datatype.clone(),
        }
    }
}

/// JSON shape of a field returned by metadata discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub json_label: String,
    pub storage_label: String,
    pub kind: &'static str,
    pub is_multiple: bool,
    pub is_names_join: bool,
    pub sort_column: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,
    pub is_custom: bool,
    pub is_category: bool,
    pub is_hidden: bool,
    pub datatype: String,
}
