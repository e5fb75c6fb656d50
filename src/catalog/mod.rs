//! Remote catalog layer for firmware version lookups
//!
//! This module describes what the engine needs from a compliance registry and
//! provides the HTTP client for the CSA Distributed Compliance Ledger.
//!
//! # Modules
//!
//! - [`registry`]: `VersionCatalog` trait consumed by the engine
//! - [`registries`]: Concrete catalog implementations (DCL)
//! - [`types`]: Candidate records and bounded strings
//! - [`error`]: Error types for catalog operations

pub mod error;
pub mod registries;
pub mod registry;
pub mod types;
