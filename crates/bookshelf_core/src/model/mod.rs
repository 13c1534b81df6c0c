//! Value types threaded through the request pipeline.
//!
//! # Responsibility
//! - Define fields, requests and response envelopes as plain values.
//! - Keep these types free of storage access so every stage is testable
//!   without a live catalog.

pub mod envelope;
pub mod field;
pub mod request;
