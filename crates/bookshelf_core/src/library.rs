//! Named library handles and routing by library name.
//!
//! # Responsibility
//! - Open one catalog per library and discover its field registry.
//! - Serve `get` and `fields` calls, serialized per library.
//!
//! # Invariants
//! - The registry is built once at open and never changes afterwards.
//! - The connection lock is held for the whole of one call.
//! - Every call returns an envelope; request failures never escape as `Err`.

use crate::db::{open_catalog, DbError};
use crate::model::envelope::Envelope;
use crate::model::field::FieldDescriptor;
use crate::model::request::Request;
use crate::registry::{FieldRegistry, RegistryError};
use crate::repo::catalog_repo::SqliteCatalogRepository;
use crate::request::parse;
use crate::response::{assemble, ApiError};
use crate::service::catalog_service::CatalogService;
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Debug)]
pub enum LibraryError {
    Db(DbError),
    Registry(RegistryError),
    DuplicateName(String),
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::DuplicateName(name) => write!(f, "library `{name}` is configured twice"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::DuplicateName(_) => None,
        }
    }
}

impl From<DbError> for LibraryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RegistryError> for LibraryError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Where a library lives and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibraryConfig {
    pub name: String,
    /// Library directory or catalog file.
    pub path: PathBuf,
}

impl FromStr for LibraryConfig {
    type Err = String;

    /// Parses `NAME=PATH`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, path) = value
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=PATH, got `{value}`"))?;
        let name = name.trim();
        let path = path.trim();
        if name.is_empty() || path.is_empty() {
            return Err(format!("expected NAME=PATH, got `{value}`"));
        }
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Read-only handle to one catalog.
pub struct Library {
    name: String,
    path: PathBuf,
    conn: Mutex<Connection>,
    registry: FieldRegistry,
}

impl Library {
    /// Opens the catalog at `path` and discovers its fields.
    ///
    /// # Side effects
    /// - Emits a `library_open` logging event.
    ///
    /// # Errors
    /// - [`LibraryError::Db`] when the catalog cannot be opened.
    /// - [`LibraryError::Registry`] when stored field metadata is malformed.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> LibraryResult<Self> {
        let started_at = Instant::now();
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        let opened = open_catalog(&path)
            .map_err(LibraryError::from)
            .and_then(|conn| {
                let registry = FieldRegistry::discover(&SqliteCatalogRepository::new(&conn))?;
                Ok((conn, registry))
            });

        match opened {
            Ok((conn, registry)) => {
                let library = Self {
                    name,
                    path,
                    conn: Mutex::new(conn),
                    registry,
                };
                info!(
                    "event=library_open module=library status=ok library={} path={} endpoints={} duration_ms={}",
                    library.name(),
                    library.path().display(),
                    library.registry().endpoints().len(),
                    started_at.elapsed().as_millis()
                );
                Ok(library)
            }
            Err(err) => {
                error!(
                    "event=library_open module=library status=error library={} path={} duration_ms={} error={}",
                    name,
                    path.display(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    pub fn from_config(config: &LibraryConfig) -> LibraryResult<Self> {
        Self::open(config.name.clone(), &config.path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Library directory as configured, not the resolved `metadata.db`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Serves `url` and returns the serialized envelope.
    pub fn get(&self, url: &str) -> Vec<u8> {
        self.response(url).to_bytes()
    }

    /// Serves `url` and returns the envelope value.
    pub fn response(&self, url: &str) -> Envelope {
        let started_at = Instant::now();
        let conn = match self.lock() {
            Ok(conn) => conn,
            Err(err) => return assemble(&self.name, None, Err(err)),
        };

        let request = match parse(&self.registry, url) {
            Ok(request) => request,
            Err(err) => {
                warn!(
                    "event=library_get module=library status=error library={} stage=parse error={}",
                    self.name, err
                );
                return assemble(&self.name, None, Err(err.into()));
            }
        };

        let service = CatalogService::new(SqliteCatalogRepository::new(&conn), &self.registry);
        let envelope = assemble(&self.name, Some(&request), service.execute(&request));
        info!(
            "event=library_get module=library status={} library={} endpoint={} duration_ms={}",
            if envelope.is_success() { "ok" } else { "error" },
            self.name,
            request.endpoint.label(),
            started_at.elapsed().as_millis()
        );
        envelope
    }

    /// Describes the fields a request against `url` would return.
    ///
    /// Metadata endpoints describe every known field.
    pub fn fields(&self, url: &str) -> Result<Vec<FieldDescriptor>, ApiError> {
        let request = parse(&self.registry, url)?;
        if request.endpoint.is_metadata() {
            return Ok(self.registry.descriptors());
        }
        if !request.is_book_query() {
            let name = request.endpoint.label();
            return self
                .registry
                .category(name)
                .map(|field| vec![field.descriptor()])
                .ok_or_else(|| ApiError::BadRequest(format!("unknown endpoint `{name}`")));
        }
        Ok(self.book_descriptors(&request))
    }

    fn book_descriptors(&self, request: &Request) -> Vec<FieldDescriptor> {
        if request.fields.is_empty() {
            return self.registry.book_fields().map(|f| f.descriptor()).collect();
        }
        let mut descriptors: Vec<FieldDescriptor> = Vec::new();
        let names = std::iter::once("id").chain(request.fields.iter().map(String::as_str));
        for field in names.filter_map(|name| self.registry.lookup(name)) {
            if !descriptors.iter().any(|d| d.json_label == field.json_label) {
                descriptors.push(field.descriptor());
            }
        }
        descriptors
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.conn.lock().map_err(|_| {
            error!(
                "event=library_get module=library status=error library={} error_code=lock_poisoned",
                self.name
            );
            ApiError::Storage("catalog connection lock poisoned".to_string())
        })
    }
}

/// Every configured library, addressed by name.
#[derive(Default)]
pub struct LibraryRegistry {
    libraries: BTreeMap<String, Library>,
}

impl LibraryRegistry {
    /// Opens every configured library; any failure aborts the whole set.
    pub fn open(configs: &[LibraryConfig]) -> LibraryResult<Self> {
        let mut registry = Self::default();
        for config in configs {
            registry.insert(Library::from_config(config)?)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, library: Library) -> LibraryResult<()> {
        if self.libraries.contains_key(library.name()) {
            return Err(LibraryError::DuplicateName(library.name().to_string()));
        }
        self.libraries.insert(library.name().to_string(), library);
        Ok(())
    }

    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(String::as_str)
    }

    /// Routes `url` to the named library; unknown names yield a 404 envelope.
    pub fn get(&self, name: &str, url: &str) -> Vec<u8> {
        self.response(name, url).to_bytes()
    }

    pub fn response(&self, name: &str, url: &str) -> Envelope {
        match self.library(name) {
            Some(library) => library.response(url),
            None => {
                warn!(
                    "event=library_get module=library status=error library={} error_code=not_found",
                    name
                );
                assemble(name, None, Err(unknown_library(name)))
            }
        }
    }

    pub fn fields(&self, name: &str, url: &str) -> Result<Vec<FieldDescriptor>, ApiError> {
        self.library(name)
            .ok_or_else(|| unknown_library(name))?
            .fields(url)
    }
}

fn unknown_library(name: &str) -> ApiError {
    ApiError::NotFound(format!("unknown library `{name}`"))
}
