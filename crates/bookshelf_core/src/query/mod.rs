//! SQL generation for parsed requests.
//!
//! # Responsibility
//! - Turn a request plus field metadata into parameterized statements.
//! - Keep placeholder expansion in one builder so SQL and arguments never
//!   drift apart.

pub mod builder;
pub mod statement;
