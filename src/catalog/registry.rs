//! Catalog trait for querying published firmware versions

#[cfg(test)]
use mockall::automock;

use crate::catalog::error::CatalogError;
use crate::catalog::types::CandidateRecord;

/// Trait for querying a remote compliance registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionCatalog: Send + Sync {
    /// Lists every software version published for a device model
    ///
    /// # Returns
    /// * `Ok(Vec<u32>)` - Published versions in no particular order; empty when nothing is published
    /// * `Err(CatalogError)` - If the request or the payload fails
    async fn list_versions(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<u32>, CatalogError>;

    /// Fetches the metadata of one published version, as seen from `current_version`
    ///
    /// # Returns
    /// * `Ok(Some(record))` - `version` is a valid upgrade for devices at `current_version`
    /// * `Ok(None)` - The registry answered but the version is not applicable
    /// * `Err(CatalogError)` - If the request or the payload fails
    async fn get_metadata(
        &self,
        vendor_id: u16,
        product_id: u16,
        version: u32,
        current_version: u32,
    ) -> Result<Option<CandidateRecord>, CatalogError>;
}
