//! Candidate cache and resolution engine
//!
//! Answers "is there a newer firmware image for this device?" from a small
//! in-memory cache, falling back to the remote catalog on a miss.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Callers   │────▶│ Dispatcher  │────▶│  Resolution │
//! │ (N threads) │     │ (1 worker)  │     │   Engine    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   ▲              │         │
//!        │                   │              ▼         ▼
//!   completion        ┌─────────────┐ ┌─────────┐ ┌─────────┐
//!   (on worker)       │Refresh timer│ │  Cache  │ │ Catalog │
//!                     └─────────────┘ └─────────┘ └─────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Fixed-capacity cache with staleness-based eviction
//! - [`resolver`]: Lookup algorithm and the `Outcome` delivered to callers
//! - [`refresh`]: Periodic sweep advancing cached candidates
//! - [`dispatcher`]: Bounded request queue drained by a single worker
//! - [`global`]: Process-wide init/resolve facade
//! - [`error`]: Error types for engine operations

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod global;
pub mod refresh;
pub mod resolver;

pub use dispatcher::{Dispatcher, spawn_refresh_timer};
pub use resolver::Outcome;
