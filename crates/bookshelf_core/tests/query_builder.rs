use bookshelf_core::query::builder::{build, build_count, build_membership, WorkingIds};
use bookshelf_core::query::statement::Statement;
use bookshelf_core::registry::preferences::CatalogPreferences;
use bookshelf_core::{parse, FieldRegistry};
use rusqlite::types::Value;

fn registry() -> FieldRegistry {
    FieldRegistry::from_preferences(CatalogPreferences::default()).unwrap()
}

fn statement(url: &str, ids: &WorkingIds) -> Statement {
    let registry = registry();
    let request = parse(&registry, url).unwrap();
    build(&request, &registry, ids).unwrap()
}

fn assert_lock_step(statement: &Statement) {
    assert_eq!(
        statement.placeholder_count(),
        statement.args.len(),
        "{}",
        statement.sql
    );
}

#[test]
fn all_items_has_no_limit_or_offset() {
    let statement = statement("/books?ids=all", &WorkingIds::Unrestricted);
    assert!(!statement.sql.contains("LIMIT"));
    assert!(!statement.sql.contains("OFFSET"));
    assert!(statement.args.is_empty());
}

#[test]
fn pagination_binds_limit_and_zero_based_offset() {
    let statement = statement(
        "/books?itemsPerPage=10&currentPage=3",
        &WorkingIds::Unrestricted,
    );
    assert!(statement.sql.ends_with(" LIMIT ? OFFSET ?"));
    assert_eq!(statement.args, vec![Value::Integer(10), Value::Integer(20)]);
}

#[test]
fn single_book_binds_only_its_id() {
    let statement = statement("/books/42", &WorkingIds::Restricted(vec![42]));
    assert_eq!(statement.args, vec![Value::Integer(42)]);
    assert_eq!(statement.sql.matches("WHERE").count(), 1);
    assert!(statement.sql.contains("WHERE books.id IN (?)"));
    assert!(!statement.sql.contains("LIMIT"));
}

#[test]
fn empty_restricted_set_matches_nothing() {
    let statement = statement("/books", &WorkingIds::Restricted(Vec::new()));
    assert!(statement.sql.contains("WHERE 1 = 0"));
    assert_lock_step(&statement);
}

#[test]
fn projection_subset_always_includes_id() {
    let statement = statement("/books?fields=title", &WorkingIds::Unrestricted);
    assert!(statement
        .sql
        .starts_with("SELECT books.id AS \"id\", books.title AS \"title\" FROM books"));
    assert!(!statement.sql.contains("LEFT JOIN"));
}

#[test]
fn relational_fields_join_one_aggregate_per_book() {
    let statement = statement("/books?fields=authors,tags", &WorkingIds::Unrestricted);
    assert!(statement.sql.contains(
        "group_concat(authors.name, ' & ' ORDER BY books_authors_link.id)"
    ));
    assert!(statement
        .sql
        .contains("group_concat(tags.name, ', ' ORDER BY books_tags_link.id)"));
    assert!(statement.sql.contains("GROUP BY books_tags_link.book) AS \"r_tags\""));
}

#[test]
fn relational_sort_uses_typed_minimum() {
    let statement = statement("/books?sort=rating", &WorkingIds::Unrestricted);
    assert!(statement.sql.contains("min(ratings.rating) AS sort_key"));
    assert!(statement
        .sql
        .contains("ORDER BY \"r_rating\".sort_key, books.id ASC"));
}

#[test]
fn sorting_by_unprojected_relation_still_joins_it() {
    let statement = statement(
        "/books?fields=title&sort=tags&order=desc",
        &WorkingIds::Unrestricted,
    );
    assert!(statement.sql.contains("AS \"r_tags\" ON \"r_tags\".book = books.id"));
    assert!(statement
        .sql
        .contains("ORDER BY \"r_tags\".sort_key DESC, books.id ASC"));
}

#[test]
fn default_book_order_is_added_date_with_id_tie_breaker() {
    let statement = statement("/books", &WorkingIds::Unrestricted);
    assert!(statement
        .sql
        .contains("ORDER BY books.timestamp, books.id ASC"));
}

#[test]
fn category_listing_counts_books_per_value() {
    let statement = statement("/tags?sort=count&order=desc", &WorkingIds::Unrestricted);
    assert!(statement.sql.contains("count(DISTINCT books_tags_link.book)"));
    assert!(statement.sql.contains(") AS listing"));
    assert!(statement
        .sql
        .contains("ORDER BY listing.\"count\" DESC, listing.\"id\" ASC"));
    assert_lock_step(&statement);
}

#[test]
fn membership_lookup_binds_item_id() {
    let registry = registry();
    let request = parse(&registry, "/tags/11").unwrap();
    let field = registry.category("tags").unwrap();
    let statement = build_membership(field, request.membership.unwrap()).unwrap();
    assert_eq!(
        statement.sql,
        "SELECT DISTINCT books_tags_link.book FROM books_tags_link \
         WHERE books_tags_link.tag = ? ORDER BY books_tags_link.book"
    );
    assert_eq!(statement.args, vec![Value::Integer(11)]);
}

#[test]
fn count_ignores_order_and_pagination() {
    let registry = registry();
    let request = parse(&registry, "/books?sort=title&currentPage=4").unwrap();
    let statement = build_count(&request, &registry, &WorkingIds::Unrestricted).unwrap();
    assert_eq!(statement.sql, "SELECT count(*) FROM books");
    assert!(statement.args.is_empty());
}

#[test]
fn metadata_statements_take_no_arguments() {
    for url in ["/preferences", "/customColumns"] {
        let statement = statement(url, &WorkingIds::Unrestricted);
        assert!(statement.args.is_empty());
        assert_eq!(statement.placeholder_count(), 0);
    }
}

#[test]
fn every_endpoint_builds_in_lock_step() {
    let registry = registry();
    let ids = WorkingIds::Restricted(vec![1, 2, 3]);
    for name in registry.endpoints() {
        let request = parse(&registry, &format!("/{name}?currentPage=2")).unwrap();
        assert_lock_step(&build(&request, &registry, &ids).unwrap());
        assert_lock_step(&build_count(&request, &registry, &ids).unwrap());
    }
}
