//! Read-only REST-to-SQL engine for book catalogs.
//! Libraries translate URL-shaped queries into SQL and answer with JSON
//! envelopes.

pub mod db;
pub mod library;
pub mod logging;
pub mod model;
pub mod query;
pub mod registry;
pub mod repo;
pub mod request;
pub mod response;
pub mod service;

pub use library::{Library, LibraryConfig, LibraryError, LibraryRegistry, LibraryResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use model::envelope::{Envelope, ErrorEntry, Links, Meta, Record};
pub use model::field::{Field, FieldDescriptor, FieldKind};
pub use model::request::{Endpoint, Request};
pub use registry::{FieldRegistry, RegistryError};
pub use request::{parse, RequestError};
pub use response::ApiError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
