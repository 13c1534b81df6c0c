//! Use-case services over repository contracts.

pub mod catalog_service;
