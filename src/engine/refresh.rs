//! Background refresh of cached candidates

use tracing::{debug, error, info};

use crate::catalog::registry::VersionCatalog;
use crate::catalog::types::ModelId;
use crate::engine::cache::CandidateCache;
use crate::engine::resolver::find_newest_candidate;

/// Refresh a single cached model
///
/// Looks for a version newer than the cached one that the registry accepts as
/// an upgrade from it. Returns true if the slot was advanced.
async fn refresh_candidate(
    cache: &mut CandidateCache,
    catalog: &dyn VersionCatalog,
    model: ModelId,
    cached_version: u32,
) -> bool {
    match find_newest_candidate(catalog, model, cached_version).await {
        Ok(Some(record)) => {
            info!(
                "Refreshed {} from v{} to v{}",
                model, cached_version, record.software_version
            );
            cache.update_in_place(model.vendor_id, model.product_id, record)
        }
        Ok(None) => {
            debug!("{} v{} is still the newest candidate", model, cached_version);
            false
        }
        Err(e) => {
            error!("Failed to refresh {}: {}", model, e);
            false
        }
    }
}

/// Advance every cached candidate to the newest applicable version
///
/// Slots are refreshed one after another. A failure abandons that slot for
/// this round without affecting the others. Never admits or evicts a model.
pub async fn refresh_cached_candidates(cache: &mut CandidateCache, catalog: &dyn VersionCatalog) {
    let targets: Vec<(ModelId, u32)> = cache
        .entries()
        .map(|entry| (entry.record.model(), entry.record.software_version))
        .collect();

    if targets.is_empty() {
        debug!("No cached candidates to refresh");
        return;
    }

    let mut refreshed = 0usize;
    for (model, cached_version) in &targets {
        if refresh_candidate(cache, catalog, *model, *cached_version).await {
            refreshed += 1;
        }
    }

    info!(
        "Refresh sweep advanced {} of {} cached candidates",
        refreshed,
        targets.len()
    );
}
