//! Status-bearing errors reported inside response envelopes.

use crate::query::builder::QueryError;
use crate::repo::catalog_repo::RepoError;
use crate::request::RequestError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const BAD_REQUEST: &str = "400 Bad Request";
pub const NOT_FOUND: &str = "404 Not Found";
pub const INTERNAL_ERROR: &str = "500 Internal Server Error";

/// Failure of one request, rendered as `<status>: <detail>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// Query execution failed against the catalog.
    Storage(String),
}

impl ApiError {
    pub fn status(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => BAD_REQUEST,
            Self::NotFound(_) => NOT_FOUND,
            Self::Storage(_) => INTERNAL_ERROR,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::BadRequest(detail) | Self::NotFound(detail) | Self::Storage(detail) => detail,
        }
    }

    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage_failed",
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status(), self.detail())
    }
}

impl Error for ApiError {}

impl From<RequestError> for ApiError {
    fn from(value: RequestError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl From<QueryError> for ApiError {
    fn from(value: QueryError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value.to_string())
    }
}
