//! Catalog implementations for fetching firmware versions

pub mod dcl;

pub use dcl::DclCatalog;
