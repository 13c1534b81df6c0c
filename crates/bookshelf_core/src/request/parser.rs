//! URL-to-request parsing.
//!
//! # Responsibility
//! - Strip the namespace prefix and match the `/<endpoint>(/<id>)?` shape.
//! - Resolve ids, pagination, sort and field selection from the query.
//!
//! # Invariants
//! - Parsing is pure: it reads the registry but never touches storage.
//! - Every rejection names the offending value in its message.

use crate::model::request::{
    Endpoint, Membership, Namespace, Page, Request, Selection, SortOrder, BOOKS_ENDPOINT,
    CUSTOM_COLUMNS_ENDPOINT, PREFERENCES_ENDPOINT,
};
use crate::query::builder::is_sort_expression;
use crate::registry::FieldRegistry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use url::Url;

static BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("valid base url"));
static PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([^/]+)(?:/([^/]+))?/?$").expect("valid path regex"));

/// `ids=` value selecting every item.
const ALL_IDS: &str = "all";
/// `fields=` selector turning a category request into a book query.
const BOOKS_SELECTOR: &str = "books";

pub type RequestResult<T> = Result<T, RequestError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    InvalidUrl(String),
    MalformedPath(String),
    UnknownEndpoint(String),
    InvalidId { param: &'static str, value: String },
    InvalidPage { param: &'static str, value: String },
    InvalidOrder(String),
    InvalidSort(String),
    UnknownField(String),
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(message) => write!(f, "invalid url: {message}"),
            Self::MalformedPath(path) => write!(f, "malformed path `{path}`"),
            Self::UnknownEndpoint(name) => write!(f, "unknown endpoint `{name}`"),
            Self::InvalidId { param, value } => write!(f, "invalid id `{value}` in {param}"),
            Self::InvalidPage { param, value } => {
                write!(f, "{param} must be a positive integer, got `{value}`")
            }
            Self::InvalidOrder(value) => write!(f, "order must be asc or desc, got `{value}`"),
            Self::InvalidSort(value) => write!(f, "invalid sort field `{value}`"),
            Self::UnknownField(name) => write!(f, "unknown field `{name}`"),
        }
    }
}

impl Error for RequestError {}

/// Parses `raw_url` (a path with optional query, or an absolute URL).
pub fn parse(registry: &FieldRegistry, raw_url: &str) -> RequestResult<Request> {
    let url = Url::options()
        .base_url(Some(&BASE_URL))
        .parse(raw_url.trim())
        .map_err(|err| RequestError::InvalidUrl(err.to_string()))?;
    let query_pairs = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();
    let param = |name: &str| {
        query_pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    };

    let (namespace, path) = strip_namespace(url.path());
    let captures = PATH_RE
        .captures(path)
        .ok_or_else(|| RequestError::MalformedPath(url.path().to_string()))?;
    let endpoint_name = captures.get(1).map_or("", |m| m.as_str());
    if !registry.endpoints().contains(endpoint_name) {
        return Err(RequestError::UnknownEndpoint(endpoint_name.to_string()));
    }
    let path_id = captures
        .get(2)
        .map(|m| parse_id("path", m.as_str()))
        .transpose()?;

    let endpoint = match endpoint_name {
        BOOKS_ENDPOINT => Endpoint::Books,
        PREFERENCES_ENDPOINT => Endpoint::Preferences,
        CUSTOM_COLUMNS_ENDPOINT => Endpoint::CustomColumns,
        name => Endpoint::Category(name.to_string()),
    };

    if endpoint.is_metadata() {
        if path_id.is_some() {
            return Err(RequestError::MalformedPath(url.path().to_string()));
        }
        return Ok(Request {
            namespace,
            endpoint,
            path_id: None,
            ids: None,
            selection: Selection::AllItems,
            membership: None,
            sort: None,
            order: SortOrder::Asc,
            fields: Vec::new(),
            is_custom_field: false,
            query_pairs,
        });
    }

    let (ids, all_items) = match param("ids") {
        None => (None, false),
        Some(ALL_IDS) => (None, true),
        Some(raw) => (parse_id_list(raw)?, false),
    };

    let requested_fields = param("fields").map(split_list).unwrap_or_default();
    let (fields, selects_books) = match &endpoint {
        Endpoint::Category(_) if requested_fields.iter().any(|f| f == BOOKS_SELECTOR) => (
            requested_fields
                .into_iter()
                .filter(|f| f != BOOKS_SELECTOR)
                .collect::<Vec<_>>(),
            true,
        ),
        Endpoint::Category(_) => (Vec::new(), false),
        _ => (requested_fields, false),
    };
    for name in &fields {
        if registry.lookup(name).filter(|f| f.is_projectable()).is_none() {
            return Err(RequestError::UnknownField(name.clone()));
        }
    }

    let membership = match (&endpoint, path_id) {
        (Endpoint::Category(_), Some(item_id)) => Some(Membership::Item(item_id)),
        (Endpoint::Category(_), None) if selects_books => Some(Membership::AnyItem),
        _ => None,
    };

    let selection = match (&endpoint, path_id, &ids) {
        _ if all_items => Selection::AllItems,
        (Endpoint::Books, Some(id), None) => Selection::Resource(id),
        _ => Selection::Collection(Page {
            items_per_page: parse_page("itemsPerPage", param("itemsPerPage"))?
                .unwrap_or(Page::default().items_per_page),
            current_page: parse_page("currentPage", param("currentPage"))?
                .unwrap_or(Page::default().current_page),
        }),
    };

    let sort = match param("sort") {
        Some(value) if is_sort_expression(value) => Some(value.to_string()),
        Some(value) => return Err(RequestError::InvalidSort(value.to_string())),
        None => None,
    };
    let order = match param("order").map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => SortOrder::Asc,
        Some("desc") => SortOrder::Desc,
        Some(other) => return Err(RequestError::InvalidOrder(other.to_string())),
    };

    let is_custom_field = match &endpoint {
        Endpoint::Category(name) => registry.lookup(name).is_some_and(|f| f.is_custom),
        _ => false,
    };

    Ok(Request {
        namespace,
        endpoint,
        path_id,
        ids,
        selection,
        membership,
        sort,
        order,
        fields,
        is_custom_field,
        query_pairs,
    })
}

fn strip_namespace(path: &str) -> (Option<Namespace>, &str) {
    for namespace in Namespace::ALL {
        if let Some(rest) = path.strip_prefix(namespace.prefix()) {
            if rest.starts_with('/') {
                return (Some(namespace), rest);
            }
        }
    }
    (None, path)
}

fn parse_id(param: &'static str, raw: &str) -> RequestResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| RequestError::InvalidId {
        param,
        value: raw.to_string(),
    })
}

/// Parses a comma-separated id list; an all-empty list means no filter.
fn parse_id_list(raw: &str) -> RequestResult<Option<Vec<i64>>> {
    let ids = split_list(raw)
        .iter()
        .map(|value| parse_id("ids", value))
        .collect::<RequestResult<Vec<_>>>()?;
    Ok((!ids.is_empty()).then_some(ids))
}

fn parse_page(param: &'static str, raw: Option<&str>) -> RequestResult<Option<u32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(RequestError::InvalidPage {
            param,
            value: raw.to_string(),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
