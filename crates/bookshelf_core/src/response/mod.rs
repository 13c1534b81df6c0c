//! Response envelope assembly and error classification.

pub mod assembler;
pub mod error;

pub use assembler::{assemble, Payload, PayloadData};
pub use error::ApiError;
