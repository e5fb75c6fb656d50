//! Shared test utilities

#![allow(dead_code)]

pub mod catalog;

pub use catalog::{CatalogCall, FakeCatalog, candidate};
