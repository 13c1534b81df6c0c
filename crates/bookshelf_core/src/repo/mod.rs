//! Repository layer over catalog storage.
//!
//! # Responsibility
//! - Define the read-only data access contract used by services.
//! - Isolate SQLite execution details from request orchestration.
//!
//! # Invariants
//! - Repository APIs never write to the catalog.

pub mod catalog_repo;
