//! Parsing of the catalog's stored preference rows.
//!
//! # Responsibility
//! - Decode the three preference keys field discovery depends on.
//!
//! # Invariants
//! - A malformed value for any decoded key is an error, never skipped.
//! - Missing keys decode to empty collections.

use super::{RegistryError, RegistryResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const FIELD_METADATA_KEY: &str = "field_metadata";
pub const SAVED_SEARCHES_KEY: &str = "saved_searches";
pub const HIDDEN_CATEGORIES_KEY: &str = "tag_browser_hidden_categories";

/// Delimiter in `is_multiple.ui_to_list` that marks name-like values.
const NAMES_DELIMITER: &str = "&";

/// One entry of the `field_metadata` preference.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FieldMetadataEntry {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub datatype: Option<String>,
    /// `{}` for single-valued fields, a delimiter descriptor otherwise.
    #[serde(default)]
    pub is_multiple: Value,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub colnum: Option<i64>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub is_category: Option<bool>,
}

impl FieldMetadataEntry {
    pub fn is_multiple(&self) -> bool {
        matches!(&self.is_multiple, Value::Object(map) if !map.is_empty())
    }

    /// Whether multiple values are entered as `&`-separated names.
    pub fn is_names_join(&self) -> bool {
        self.is_multiple.get("ui_to_list").and_then(Value::as_str) == Some(NAMES_DELIMITER)
    }
}

/// Decoded catalog preferences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPreferences {
    pub hidden_categories: Vec<String>,
    pub saved_searches: BTreeMap<String, String>,
    /// Keyed by raw storage name (`#genre`, `authors`, ...).
    pub field_metadata: BTreeMap<String, FieldMetadataEntry>,
}

impl CatalogPreferences {
    /// Decodes `(key, val)` rows from the catalog's `preferences` table.
    pub fn from_rows<I>(rows: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut prefs = Self::default();
        for (key, raw) in rows {
            match key.as_str() {
                FIELD_METADATA_KEY => prefs.field_metadata = decode(&key, &raw)?,
                SAVED_SEARCHES_KEY => prefs.saved_searches = decode(&key, &raw)?,
                HIDDEN_CATEGORIES_KEY => prefs.hidden_categories = decode(&key, &raw)?,
                _ => {}
            }
        }
        Ok(prefs)
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> RegistryResult<T> {
    serde_json::from_str(raw).map_err(|err| RegistryError::MalformedPreference {
        key: key.to_string(),
        message: err.to_string(),
    })
}
