//! Inbound request parsing.
//!
//! # Responsibility
//! - Validate URL-shaped queries against a library's endpoint set.
//! - Produce immutable [`crate::model::request::Request`] values.

pub mod parser;

pub use parser::{parse, RequestError, RequestResult};
