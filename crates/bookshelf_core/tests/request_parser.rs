mod common;

use bookshelf_core::db::open_catalog;
use bookshelf_core::model::request::{Endpoint, Membership, Selection};
use bookshelf_core::repo::catalog_repo::SqliteCatalogRepository;
use bookshelf_core::{parse, FieldRegistry, RequestError};

fn registry() -> FieldRegistry {
    let catalog = common::catalog();
    let conn = open_catalog(catalog.db_path()).unwrap();
    FieldRegistry::discover(&SqliteCatalogRepository::new(&conn)).unwrap()
}

#[test]
fn custom_categories_are_endpoints() {
    let registry = registry();
    let request = parse(&registry, "/opds/genre/4").unwrap();
    assert_eq!(request.endpoint, Endpoint::Category("genre".to_string()));
    assert_eq!(request.membership, Some(Membership::Item(4)));
    assert!(request.is_custom_field);
    assert_eq!(request.full_path(), "/opds/genre/4");
}

#[test]
fn builtin_categories_are_not_custom() {
    let request = parse(&registry(), "/tags").unwrap();
    assert!(!request.is_custom_field);
    assert!(!request.is_book_query());
}

#[test]
fn per_book_custom_fields_are_projectable_but_not_browsable() {
    let registry = registry();
    let request = parse(&registry, "/books?fields=pages,saga").unwrap();
    assert_eq!(request.fields, ["pages".to_string(), "saga".to_string()]);

    let err = parse(&registry, "/pages").unwrap_err();
    assert_eq!(err, RequestError::UnknownEndpoint("pages".to_string()));
}

#[test]
fn composite_custom_fields_are_unknown() {
    let err = parse(&registry(), "/books?fields=shelfmark").unwrap_err();
    assert_eq!(err, RequestError::UnknownField("shelfmark".to_string()));
}

#[test]
fn absolute_urls_and_trailing_slashes_parse() {
    let registry = registry();
    let request = parse(&registry, "http://example.org/api/books/7/").unwrap();
    assert_eq!(request.selection, Selection::Resource(7));

    let request = parse(&registry, "/books?ids=5,%206").unwrap();
    assert_eq!(request.ids, Some(vec![5, 6]));
}

#[test]
fn every_discovered_endpoint_parses_and_unknown_ones_do_not() {
    let registry = registry();
    for name in registry.endpoints() {
        assert_eq!(parse(&registry, &format!("/{name}")).unwrap().endpoint.label(), name);
    }
    for name in ["widgets", "title", "uri"] {
        let err = parse(&registry, &format!("/{name}")).unwrap_err();
        assert!(err.to_string().contains(name));
    }
}
