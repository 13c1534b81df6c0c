//! JSON response envelope.
//!
//! # Invariants
//! - `links` and `meta` always serialize as objects, possibly empty.
//! - `errors` is non-empty exactly when `data` is `null`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One book or category row: projected column label to stringified value.
pub type Record = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Links {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub library: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub status: String,
    pub detail: String,
}

impl ErrorEntry {
    /// Splits `message` on its first colon into status and detail.
    pub fn from_message(message: &str) -> Self {
        match message.split_once(':') {
            Some((status, detail)) => Self {
                status: status.trim().to_string(),
                detail: detail.trim().to_string(),
            },
            None => Self {
                status: message.trim().to_string(),
                detail: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub links: Links,
    pub data: Value,
    pub errors: Vec<ErrorEntry>,
    pub meta: Meta,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Serializes the envelope to JSON bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(err) => {
                let detail = Value::String(err.to_string());
                format!(
                    r#"{{"links":{{}},"data":null,"errors":[{{"status":"500 Internal Server Error","detail":{detail}}}],"meta":{{}}}}"#
                )
                .into_bytes()
            }
        }
    }
}
