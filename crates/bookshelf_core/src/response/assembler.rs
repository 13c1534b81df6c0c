//! Envelope assembly.
//!
//! # Responsibility
//! - Map result rows into JSON records.
//! - Compute pagination metadata and navigation links.
//! - Convert a failed request into a single envelope error entry.
//!
//! # Invariants
//! - Links re-encode the original query; only `currentPage` is rewritten.
//! - A failed request always yields `data: null` and exactly one error.

use super::error::ApiError;
use crate::model::envelope::{Envelope, ErrorEntry, Links, Meta, Record};
use crate::model::request::Request;
use serde_json::{Map, Value};
use url::form_urlencoded;

const CURRENT_PAGE_PARAM: &str = "currentPage";

/// Query result handed to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadData {
    Records(Vec<Record>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub number_of_items: u64,
    pub data: PayloadData,
}

/// Wraps the outcome of one request into an envelope.
///
/// `request` is `None` when parsing failed.
pub fn assemble(
    library: &str,
    request: Option<&Request>,
    outcome: Result<Payload, ApiError>,
) -> Envelope {
    let mut meta = Meta {
        library: library.to_string(),
        endpoint: request.map(|request| request.endpoint.label().to_string()),
        ..Meta::default()
    };

    match outcome {
        Ok(payload) => {
            let links = match request {
                Some(request) => build_links(request, payload.number_of_items),
                None => Links::default(),
            };
            meta.number_of_items = Some(payload.number_of_items);
            if let Some(page) = request.and_then(Request::page) {
                meta.current_page = Some(page.current_page);
                meta.items_per_page = Some(page.items_per_page);
            }
            Envelope {
                links,
                data: render_data(payload.data),
                errors: Vec::new(),
                meta,
            }
        }
        Err(err) => Envelope {
            links: Links {
                self_link: request.map(|request| encode_link(request, None)),
                ..Links::default()
            },
            data: Value::Null,
            errors: vec![ErrorEntry::from_message(&err.to_string())],
            meta,
        },
    }
}

/// Navigation links for `number_of_items` results of `request`.
pub fn build_links(request: &Request, number_of_items: u64) -> Links {
    let Some(page) = request.page() else {
        return Links {
            self_link: Some(encode_link(request, None)),
            ..Links::default()
        };
    };

    let force_first_page = !request.has_explicit_page() && number_of_items > 1;
    let mut links = Links {
        self_link: Some(encode_link(
            request,
            force_first_page.then_some(u64::from(page.current_page)),
        )),
        ..Links::default()
    };

    if number_of_items > u64::from(page.items_per_page) {
        let current = u64::from(page.current_page);
        let last = page.last_page(number_of_items);
        links.first = Some(encode_link(request, Some(1)));
        links.prev = Some(encode_link(request, Some(current.saturating_sub(1).max(1))));
        links.next = Some(encode_link(request, Some((current + 1).min(last))));
        links.last = Some(encode_link(request, Some(last)));
    }

    links
}

/// Re-encodes the request path and query, optionally swapping `currentPage`.
pub fn encode_link(request: &Request, current_page: Option<u64>) -> String {
    let mut pairs = request.query_pairs.clone();
    if let Some(page) = current_page {
        let value = page.to_string();
        match pairs.iter().position(|(key, _)| key == CURRENT_PAGE_PARAM) {
            Some(index) => {
                pairs[index].1 = value;
                let mut seen = 0;
                pairs.retain(|(key, _)| {
                    if key != CURRENT_PAGE_PARAM {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => pairs.push((CURRENT_PAGE_PARAM.to_string(), value)),
        }
    }

    let path = request.full_path();
    if pairs.is_empty() {
        return path;
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    format!("{path}?{query}")
}

fn render_data(data: PayloadData) -> Value {
    match data {
        PayloadData::Json(value) => value,
        PayloadData::Records(records) => Value::Array(
            records
                .into_iter()
                .map(|record| {
                    Value::Object(
                        record
                            .into_iter()
                            .map(|(label, value)| (label, value.map_or(Value::Null, Value::String)))
                            .collect::<Map<_, _>>(),
                    )
                })
                .collect(),
        ),
    }
}
