//! Request-to-SQL translation.
//!
//! # Responsibility
//! - Dispatch a parsed request to the matching statement shape.
//! - Share the id-filter, ordering and pagination suffix across shapes.
//!
//! # Invariants
//! - Multi-valued fields resolve to one row per book: every relation is
//!   joined through a derived table grouped by book.
//! - Every ordering ends with an id tie-breaker, so equal sort keys page
//!   deterministically.
//! - `LIMIT`/`OFFSET` appear only when the request is paginated.

use super::statement::{Statement, StatementBuilder};
use crate::model::field::{ColumnSource, Field, FieldKind, Relation};
use crate::model::request::{Endpoint, Membership, Request, SortOrder};
use crate::registry::schema::{relation_alias, URI_FIELD};
use crate::registry::FieldRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SORT_EXPRESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid sort expression regex")
});

const DEFAULT_BOOK_SORT: &str = "books.timestamp";
const DEFAULT_LISTING_SORT: &str = "listing.\"name\"";
const ID_FIELD: &str = "id";

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    UnknownField(String),
    NotACategory(String),
    InvalidSort(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "unknown field `{name}`"),
            Self::NotACategory(name) => write!(f, "`{name}` is not a browsable category"),
            Self::InvalidSort(value) => write!(f, "invalid sort field `{value}`"),
        }
    }
}

impl Error for QueryError {}

/// Book or item ids a request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkingIds {
    #[default]
    Unrestricted,
    Restricted(Vec<i64>),
}

impl WorkingIds {
    pub fn ids(&self) -> Option<&[i64]> {
        match self {
            Self::Unrestricted => None,
            Self::Restricted(ids) => Some(ids),
        }
    }
}

/// Whether `value` may be used verbatim as an `ORDER BY` expression.
pub fn is_sort_expression(value: &str) -> bool {
    SORT_EXPRESSION_RE.is_match(value)
}

/// Builds the statement that produces the request's data rows.
pub fn build(
    request: &Request,
    registry: &FieldRegistry,
    ids: &WorkingIds,
) -> QueryResult<Statement> {
    match &request.endpoint {
        Endpoint::Preferences => Ok(preferences_statement()),
        Endpoint::CustomColumns => Ok(custom_columns_statement()),
        Endpoint::Books => build_books(request, registry, ids),
        Endpoint::Category(_) if request.membership.is_some() => {
            build_books(request, registry, ids)
        }
        Endpoint::Category(name) => build_listing(request, category(registry, name)?, ids),
    }
}

/// Builds an exact `count(*)` over the rows [`build`] would page through.
pub fn build_count(
    request: &Request,
    registry: &FieldRegistry,
    ids: &WorkingIds,
) -> QueryResult<Statement> {
    let mut builder = match &request.endpoint {
        Endpoint::Category(name) if !request.is_book_query() => {
            let field = category(registry, name)?;
            StatementBuilder::new(format!(
                "SELECT count(*) FROM ({}) AS listing",
                listing_source(relation_of(field)?)
            ))
        }
        _ => StatementBuilder::new("SELECT count(*) FROM books"),
    };

    if let Some(ids) = ids.ids() {
        let column = if request.is_book_query() {
            "books.id"
        } else {
            "listing.\"id\""
        };
        builder.push(" WHERE ");
        builder.push_id_filter(column, ids);
    }
    Ok(builder.build())
}

/// Builds the lookup of book ids linked to a category item.
pub fn build_membership(field: &Field, membership: Membership) -> QueryResult<Statement> {
    let relation = relation_of(field)?;
    let join_table = relation.join_table();
    let mut builder = StatementBuilder::new(format!("SELECT DISTINCT {join_table}.book FROM {join_table}"));

    match (membership, &relation.link) {
        (Membership::AnyItem, _) => {}
        (Membership::Item(item_id), Some(link)) => {
            builder.push_bound(
                &format!(" WHERE {}.{} = ?", link.table, link.column),
                Value::Integer(item_id),
            );
        }
        (Membership::Item(item_id), None) => {
            let table = &relation.table;
            let value = &relation.value;
            builder.push_bound(
                &format!(" WHERE {value} = (SELECT {value} FROM {table} WHERE {table}.id = ?)"),
                Value::Integer(item_id),
            );
        }
    }

    builder.push(&format!(" ORDER BY {join_table}.book"));
    Ok(builder.build())
}

/// Every catalog preference as one JSON object.
pub fn preferences_statement() -> Statement {
    Statement::fixed(
        "SELECT json_group_object(key, json(val)) AS data
         FROM (SELECT key, val FROM preferences ORDER BY key)",
    )
}

/// Every live custom column definition as one JSON array.
pub fn custom_columns_statement() -> Statement {
    Statement::fixed(
        "SELECT json_group_array(json_object(
            'id', id,
            'label', label,
            'name', name,
            'datatype', datatype,
            'isMultiple', json(CASE WHEN is_multiple THEN 'true' ELSE 'false' END),
            'normalized', json(CASE WHEN normalized THEN 'true' ELSE 'false' END),
            'editable', json(CASE WHEN editable THEN 'true' ELSE 'false' END),
            'display', json(display)
         ) ORDER BY id) AS data
         FROM custom_columns
         WHERE mark_for_delete = 0",
    )
}

fn category<'r>(registry: &'r FieldRegistry, name: &str) -> QueryResult<&'r Field> {
    registry
        .category(name)
        .ok_or_else(|| QueryError::NotACategory(name.to_string()))
}

fn relation_of(field: &Field) -> QueryResult<&Relation> {
    field
        .relation()
        .ok_or_else(|| QueryError::NotACategory(field.json_label.clone()))
}

fn build_books(
    request: &Request,
    registry: &FieldRegistry,
    ids: &WorkingIds,
) -> QueryResult<Statement> {
    let projection = projection(request, registry)?;
    let (sort_expr, sort_field) = book_sort(request, registry)?;

    let mut joined: Vec<&Field> = projection
        .iter()
        .copied()
        .filter(|field| field.relation().is_some())
        .collect();
    if let Some(field) = sort_field {
        if field.relation().is_some() && !joined.iter().any(|f| f.json_label == field.json_label) {
            joined.push(field);
        }
    }

    let columns = projection
        .iter()
        .flat_map(|field| select_columns(field))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = StatementBuilder::new(format!("SELECT {columns} FROM books"));
    for field in &joined {
        if let Some(relation) = field.relation() {
            builder.push(&relation_join(field, relation));
        }
    }

    if let Some(ids) = ids.ids() {
        builder.push(" WHERE ");
        builder.push_id_filter("books.id", ids);
    }

    push_order_and_page(&mut builder, request, &sort_expr, "books.id");
    Ok(builder.build())
}

fn build_listing(request: &Request, field: &Field, ids: &WorkingIds) -> QueryResult<Statement> {
    let relation = relation_of(field)?;
    let mut builder = StatementBuilder::new(format!(
        "SELECT listing.\"id\" AS \"id\", listing.\"name\" AS \"name\", listing.\"count\" AS \"count\" FROM ({}) AS listing",
        listing_source(relation)
    ));

    if let Some(ids) = ids.ids() {
        builder.push(" WHERE ");
        builder.push_id_filter("listing.\"id\"", ids);
    }

    let sort_expr = listing_sort(request)?;
    push_order_and_page(&mut builder, request, &sort_expr, "listing.\"id\"");
    Ok(builder.build())
}

/// Distinct values of a relation with their id and book count.
fn listing_source(relation: &Relation) -> String {
    let table = &relation.table;
    let value = &relation.value;
    match &relation.link {
        Some(link) => format!(
            "SELECT {table}.id AS \"id\", {value} AS \"name\", count(DISTINCT {lt}.book) AS \"count\" \
             FROM {table} LEFT JOIN {lt} ON {lt}.{lc} = {table}.id \
             GROUP BY {table}.id",
            lt = link.table,
            lc = link.column,
        ),
        None => format!(
            "SELECT min({table}.id) AS \"id\", {value} AS \"name\", count(DISTINCT {table}.book) AS \"count\" \
             FROM {table} \
             GROUP BY {value}"
        ),
    }
}

fn projection<'r>(request: &Request, registry: &'r FieldRegistry) -> QueryResult<Vec<&'r Field>> {
    if request.fields.is_empty() {
        return Ok(registry.book_fields().collect());
    }

    let mut fields: Vec<&Field> = Vec::new();
    let names = std::iter::once(ID_FIELD).chain(request.fields.iter().map(String::as_str));
    for name in names {
        let field = registry
            .lookup(name)
            .filter(|field| field.is_projectable())
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
        if !fields.iter().any(|f| f.json_label == field.json_label) {
            fields.push(field);
        }
    }
    Ok(fields)
}

fn select_columns(field: &Field) -> Vec<String> {
    let label = &field.json_label;
    match &field.kind {
        FieldKind::Column(ColumnSource::Books(column)) => {
            vec![format!("books.{column} AS \"{label}\"")]
        }
        FieldKind::Column(ColumnSource::BookUri) => {
            vec![format!("'/books/' || books.id AS \"{URI_FIELD}\"")]
        }
        FieldKind::Column(ColumnSource::Metadata) => Vec::new(),
        FieldKind::Item(relation) | FieldKind::Category(relation) => {
            let alias = relation_alias(label);
            let mut columns = vec![format!("{alias}.value AS \"{label}\"")];
            if relation.position.is_some() {
                columns.push(format!("{alias}.position AS \"{label}Index\""));
            }
            columns
        }
    }
}

/// `LEFT JOIN` against a per-book aggregate of `relation`.
fn relation_join(field: &Field, relation: &Relation) -> String {
    let alias = relation_alias(&field.json_label);
    let join_table = relation.join_table();
    let separator = field.separator();
    let value = &relation.value;

    let position = relation
        .position
        .as_ref()
        .map(|column| format!(", max({join_table}.{column}) AS position"))
        .unwrap_or_default();
    let value_join = relation
        .link
        .as_ref()
        .map(|link| {
            format!(
                " JOIN {table} ON {table}.id = {lt}.{lc}",
                table = relation.table,
                lt = link.table,
                lc = link.column
            )
        })
        .unwrap_or_default();

    format!(
        " LEFT JOIN (SELECT {join_table}.book AS book, \
         group_concat({value}, '{separator}' ORDER BY {join_table}.id) AS value, \
         min({value}) AS sort_key{position} \
         FROM {join_table}{value_join} \
         GROUP BY {join_table}.book) AS {alias} ON {alias}.book = books.id"
    )
}

fn book_sort<'r>(
    request: &Request,
    registry: &'r FieldRegistry,
) -> QueryResult<(String, Option<&'r Field>)> {
    let Some(name) = request.sort.as_deref() else {
        return Ok((DEFAULT_BOOK_SORT.to_string(), None));
    };

    match registry.sort_field(name) {
        Some(field) => Ok((field.sort_column.clone(), Some(field))),
        None if is_sort_expression(name) => Ok((name.to_string(), None)),
        None => Err(QueryError::InvalidSort(name.to_string())),
    }
}

fn listing_sort(request: &Request) -> QueryResult<String> {
    match request.sort.as_deref() {
        None => Ok(DEFAULT_LISTING_SORT.to_string()),
        Some("id") => Ok("listing.\"id\"".to_string()),
        Some("name" | "value") => Ok(DEFAULT_LISTING_SORT.to_string()),
        Some("count") => Ok("listing.\"count\"".to_string()),
        Some(name) if is_sort_expression(name) => Ok(name.to_string()),
        Some(name) => Err(QueryError::InvalidSort(name.to_string())),
    }
}

fn push_order_and_page(
    builder: &mut StatementBuilder,
    request: &Request,
    sort_expr: &str,
    tie_breaker: &str,
) {
    builder.push(&format!(" ORDER BY {sort_expr}"));
    if request.order == SortOrder::Desc {
        builder.push(" DESC");
    }
    if sort_expr != tie_breaker {
        builder.push(&format!(", {tie_breaker} ASC"));
    }

    if let Some(page) = request.page() {
        builder.push_bound(" LIMIT ?", Value::Integer(i64::from(page.items_per_page)));
        builder.push_bound(
            " OFFSET ?",
            Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)),
        );
    }
}
