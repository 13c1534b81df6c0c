//! Request execution pipeline.
//!
//! # Responsibility
//! - Resolve the working id set of a parsed request.
//! - Count, query and package results for the assembler.
//!
//! # Invariants
//! - Service layer remains storage-agnostic; all SQL runs through the
//!   repository contract.
//! - A failed stage ends the pipeline; nothing is retried.

use crate::model::request::{Request, Selection};
use crate::query::builder::{self, QueryError, WorkingIds};
use crate::registry::FieldRegistry;
use crate::repo::catalog_repo::CatalogRepository;
use crate::response::{ApiError, Payload, PayloadData};
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use std::time::Instant;

pub type ServiceResult<T> = Result<T, ApiError>;

/// Executes parsed requests for one library.
pub struct CatalogService<'r, R: CatalogRepository> {
    repo: R,
    registry: &'r FieldRegistry,
}

impl<'r, R: CatalogRepository> CatalogService<'r, R> {
    pub fn new(repo: R, registry: &'r FieldRegistry) -> Self {
        Self { repo, registry }
    }

    /// Runs `request` to completion.
    ///
    /// # Side effects
    /// - Emits a `request_execute` logging event.
    ///
    /// # Errors
    /// - [`ApiError::BadRequest`] when the request cannot be translated.
    /// - [`ApiError::Storage`] when a statement fails.
    pub fn execute(&self, request: &Request) -> ServiceResult<Payload> {
        let started_at = Instant::now();
        let result = if request.endpoint.is_metadata() {
            self.execute_metadata(request)
        } else {
            self.execute_collection(request)
        };

        match &result {
            Ok(payload) => info!(
                "event=request_execute module=service status=ok endpoint={} items={} duration_ms={}",
                request.endpoint.label(),
                payload.number_of_items,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=request_execute module=service status=error endpoint={} error_code={} duration_ms={}",
                request.endpoint.label(),
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Resolves the ids a request is scoped to.
    ///
    /// An explicit `ids=` list wins over a path id; a category path id is
    /// resolved to the ids of the books linked to that item.
    pub fn working_ids(&self, request: &Request) -> ServiceResult<WorkingIds> {
        if let Some(ids) = &request.ids {
            return Ok(WorkingIds::Restricted(ids.clone()));
        }
        if let Selection::Resource(id) = request.selection {
            return Ok(WorkingIds::Restricted(vec![id]));
        }
        let Some(membership) = request.membership else {
            return Ok(WorkingIds::Unrestricted);
        };

        let name = request.endpoint.label();
        let field = self
            .registry
            .category(name)
            .ok_or_else(|| QueryError::NotACategory(name.to_string()))?;
        let ids = self
            .repo
            .fetch_ids(&builder::build_membership(field, membership)?)?;
        debug!(
            "event=membership_resolve module=service status=ok category={} books={}",
            name,
            ids.len()
        );
        Ok(WorkingIds::Restricted(ids))
    }

    fn execute_collection(&self, request: &Request) -> ServiceResult<Payload> {
        let ids = self.working_ids(request)?;
        let number_of_items = match ids.ids() {
            Some(ids) => ids.len() as u64,
            None => self
                .repo
                .fetch_count(&builder::build_count(request, self.registry, &ids)?)?,
        };

        let statement = builder::build(request, self.registry, &ids)?;
        let records = self.repo.fetch_records(&statement)?;
        Ok(Payload {
            number_of_items,
            data: PayloadData::Records(records),
        })
    }

    fn execute_metadata(&self, request: &Request) -> ServiceResult<Payload> {
        let statement = builder::build(request, self.registry, &WorkingIds::Unrestricted)?;
        let data = self.repo.fetch_json(&statement)?;
        let number_of_items = match &data {
            JsonValue::Array(items) => items.len() as u64,
            JsonValue::Object(entries) => entries.len() as u64,
            JsonValue::Null => 0,
            _ => 1,
        };
        Ok(Payload {
            number_of_items,
            data: PayloadData::Json(data),
        })
    }
}
