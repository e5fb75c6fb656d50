//! Candidate resolution: cache first, registry on a miss
//!
//! A miss lists every published version, then walks them newest-first asking
//! the registry whether each one applies to the device's current version. An
//! inapplicable version falls back to the next older one; a failed request
//! ends the resolution.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::error::CatalogError;
use crate::catalog::registry::VersionCatalog;
use crate::catalog::types::{CandidateRecord, ModelId};
use crate::engine::cache::CandidateCache;
use crate::engine::refresh::refresh_cached_candidates;

/// Answer delivered to a lookup caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "candidate", rename_all = "camelCase")]
pub enum Outcome {
    Available(CandidateRecord),
    NotAvailable,
}

/// Finds the newest published version above `current_version` that the
/// registry accepts as an upgrade from it.
///
/// Each version is queried at most once. Returns `Ok(None)` when nothing is
/// published or every newer version is rejected, and stops at the first error.
pub async fn find_newest_candidate(
    catalog: &dyn VersionCatalog,
    model: ModelId,
    current_version: u32,
) -> Result<Option<CandidateRecord>, CatalogError> {
    let mut versions = catalog
        .list_versions(model.vendor_id, model.product_id)
        .await?;

    if versions.is_empty() {
        debug!("No versions published for {}", model);
        return Ok(None);
    }

    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();

    for version in versions.into_iter().take_while(|&v| v > current_version) {
        match catalog
            .get_metadata(model.vendor_id, model.product_id, version, current_version)
            .await?
        {
            Some(record) => return Ok(Some(record)),
            None => debug!(
                "{} v{} rejected for v{}, trying older versions",
                model, version, current_version
            ),
        }
    }

    Ok(None)
}

/// Owns the candidate cache and answers lookups against it.
///
/// Not synchronized: exactly one task drives an engine.
pub struct ResolutionEngine {
    catalog: Arc<dyn VersionCatalog>,
    cache: CandidateCache,
}

impl ResolutionEngine {
    pub fn new(catalog: Arc<dyn VersionCatalog>, capacity: usize) -> Self {
        Self {
            catalog,
            cache: CandidateCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &CandidateCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut CandidateCache {
        &mut self.cache
    }

    pub async fn resolve(
        &mut self,
        vendor_id: u16,
        product_id: u16,
        current_version: u32,
    ) -> Outcome {
        let model = ModelId::new(vendor_id, product_id);

        if let Some(record) = self.cache.find(vendor_id, product_id) {
            if record.is_valid_for(current_version) {
                debug!(
                    "Cache hit for {}: v{} for v{}",
                    model, record.software_version, current_version
                );
                return Outcome::Available(record.clone());
            }
            debug!(
                "Cached v{} for {} does not apply to v{}, re-querying",
                record.software_version, model, current_version
            );
            self.cache.invalidate(vendor_id, product_id);
        }

        match find_newest_candidate(&*self.catalog, model, current_version).await {
            Ok(Some(record)) => {
                info!(
                    "Found candidate {} v{} for v{}",
                    model, record.software_version, current_version
                );
                self.cache.admit(record.clone());
                Outcome::Available(record)
            }
            Ok(None) => {
                debug!("No candidate for {} above v{}", model, current_version);
                Outcome::NotAvailable
            }
            Err(e) => {
                warn!("Failed to resolve candidate for {}: {}", model, e);
                Outcome::NotAvailable
            }
        }
    }

    /// Advances every cached candidate to the newest applicable version.
    pub async fn refresh_sweep(&mut self) {
        refresh_cached_candidates(&mut self.cache, &*self.catalog).await;
    }
}
