//! Field metadata registry.
//!
//! # Responsibility
//! - Discover the queryable fields of one catalog from its preferences.
//! - Merge discovered custom fields with the built-in schema table.
//! - Answer field lookups and the endpoint set for request validation.
//!
//! # Invariants
//! - The registry is built once per library and never mutated afterwards.
//! - Custom fields replace built-ins on public-name collision.
//! - Discovery either yields a complete registry or fails; there is no
//!   partial registry.

pub mod preferences;
pub mod schema;

use crate::model::field::{Field, FieldDescriptor, FieldKind};
use crate::model::request::{BOOKS_ENDPOINT, CUSTOM_COLUMNS_ENDPOINT, PREFERENCES_ENDPOINT};
use crate::repo::catalog_repo::{CatalogRepository, RepoError};
use log::{debug, info, warn};
use preferences::{CatalogPreferences, FieldMetadataEntry};
use schema::{
    custom_relation, custom_storage, is_plain_identifier, relation_sort_key, CustomStorage,
};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Marker prefixing the storage name of custom fields.
const CUSTOM_FIELD_MARKER: char = '#';

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug)]
pub enum RegistryError {
    /// A decoded preference value is not valid JSON of the expected shape.
    MalformedPreference { key: String, message: String },
    /// A custom field entry cannot be turned into a queryable field.
    InvalidFieldMetadata { key: String, message: String },
    Repo(RepoError),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPreference { key, message } => {
                write!(f, "malformed catalog preference `{key}`: {message}")
            }
            Self::InvalidFieldMetadata { key, message } => {
                write!(f, "invalid field metadata for `{key}`: {message}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RegistryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Immutable set of fields known for one library.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: BTreeMap<String, Field>,
    hidden_categories: Vec<String>,
    saved_searches: BTreeMap<String, String>,
}

impl FieldRegistry {
    /// Loads preferences through `repo` and builds the registry.
    ///
    /// # Side effects
    /// - Emits a `registry_discover` logging event with field counts.
    pub fn discover(repo: &impl CatalogRepository) -> RegistryResult<Self> {
        let started_at = Instant::now();
        let rows = repo.load_preferences()?;
        let registry = Self::from_preferences(CatalogPreferences::from_rows(rows)?)?;
        info!(
            "event=registry_discover module=registry status=ok fields={} custom={} duration_ms={}",
            registry.fields.len(),
            registry.fields.values().filter(|f| f.is_custom).count(),
            started_at.elapsed().as_millis()
        );
        Ok(registry)
    }

    /// Builds the registry from decoded preferences.
    pub fn from_preferences(prefs: CatalogPreferences) -> RegistryResult<Self> {
        let mut fields = schema::builtin_fields()
            .into_iter()
            .map(|field| (field.json_label.clone(), field))
            .collect::<BTreeMap<_, _>>();

        for (key, entry) in &prefs.field_metadata {
            if !entry.is_custom {
                continue;
            }
            match custom_field(key, entry)? {
                Some(field) => {
                    if fields.contains_key(&field.json_label) {
                        warn!(
                            "event=registry_discover module=registry status=override field={}",
                            field.json_label
                        );
                    }
                    fields.insert(field.json_label.clone(), field);
                }
                None => debug!(
                    "event=registry_discover module=registry status=skip field={} reason=unstored",
                    key
                ),
            }
        }

        for field in fields.values_mut() {
            field.is_hidden = prefs
                .hidden_categories
                .iter()
                .any(|hidden| hidden == &field.storage_label || hidden == &field.json_label);
        }

        Ok(Self {
            fields,
            hidden_categories: prefs.hidden_categories,
            saved_searches: prefs.saved_searches,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Category field browsable at `/<name>`.
    pub fn category(&self, name: &str) -> Option<&Field> {
        self.lookup(name)
            .filter(|field| field.is_category && field.relation().is_some())
    }

    /// Every endpoint name a request may target.
    pub fn endpoints(&self) -> BTreeSet<String> {
        let mut endpoints = self
            .fields
            .values()
            .filter(|field| field.is_category && field.relation().is_some())
            .map(|field| field.json_label.clone())
            .collect::<BTreeSet<_>>();
        endpoints.insert(BOOKS_ENDPOINT.to_string());
        endpoints.insert(PREFERENCES_ENDPOINT.to_string());
        endpoints.insert(CUSTOM_COLUMNS_ENDPOINT.to_string());
        endpoints
    }

    /// Fields that produce a value in book records, in label order.
    pub fn book_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().filter(|field| field.is_projectable())
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.fields.values().map(Field::descriptor).collect()
    }

    /// Field a public sort name resolves to; only projectable fields sort.
    pub fn sort_field(&self, name: &str) -> Option<&Field> {
        self.lookup(name).filter(|field| field.is_projectable())
    }

    /// Sort expression for a public field name.
    pub fn sort_column(&self, name: &str) -> Option<&str> {
        self.sort_field(name).map(|field| field.sort_column.as_str())
    }

    pub fn hidden_categories(&self) -> &[String] {
        &self.hidden_categories
    }

    pub fn saved_searches(&self) -> &BTreeMap<String, String> {
        &self.saved_searches
    }
}

fn custom_field(key: &str, entry: &FieldMetadataEntry) -> RegistryResult<Option<Field>> {
    let invalid = |message: String| RegistryError::InvalidFieldMetadata {
        key: key.to_string(),
        message,
    };

    let json_label = key.trim_start_matches(CUSTOM_FIELD_MARKER);
    if !is_plain_identifier(json_label) {
        return Err(invalid(format!("public name `{json_label}` is not a plain identifier")));
    }

    let datatype = entry.datatype.as_deref().unwrap_or_default();
    let Some(storage) = custom_storage(datatype) else {
        warn!(
            "event=registry_discover module=registry status=skip field={} reason=unknown_datatype datatype={}",
            key, datatype
        );
        return Ok(None);
    };
    if storage == CustomStorage::Unstored {
        return Ok(None);
    }

    let table = match (&entry.table, entry.colnum) {
        (Some(table), _) => table.clone(),
        (None, Some(colnum)) => format!("custom_column_{colnum}"),
        (None, None) => return Err(invalid("neither `table` nor `colnum` is set".to_string())),
    };
    if !is_plain_identifier(&table) {
        return Err(invalid(format!("table `{table}` is not a plain identifier")));
    }

    let Some(relation) = custom_relation(&table, storage) else {
        return Ok(None);
    };

    let is_multiple = entry.is_multiple();
    let is_normalized = matches!(storage, CustomStorage::Normalized { .. });
    let kind = if is_multiple {
        FieldKind::Category(relation)
    } else {
        FieldKind::Item(relation)
    };

    Ok(Some(Field {
        json_label: json_label.to_string(),
        storage_label: key.to_string(),
        kind,
        is_multiple,
        is_names_join: is_multiple && entry.is_names_join(),
        sort_column: relation_sort_key(json_label),
        is_custom: true,
        is_category: entry.is_category.unwrap_or(is_normalized) && is_normalized,
        is_hidden: false,
        datatype: datatype.to_string(),
    }))
}
