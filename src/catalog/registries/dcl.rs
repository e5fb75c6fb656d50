//! Distributed Compliance Ledger (DCL) REST API implementation

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::error::CatalogError;
use crate::catalog::registry::VersionCatalog;
use crate::catalog::types::{CandidateRecord, ModelId};
use crate::config::{CatalogConfig, FETCH_TIMEOUT_MS};

/// Response from `GET {base}/{vid}/{pid}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVersionsResponse {
    model_versions: ModelVersions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVersions {
    software_versions: Vec<u32>,
}

/// Response from `GET {base}/{vid}/{pid}/{version}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVersionResponse {
    model_version: Option<ModelVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVersion {
    software_version_valid: bool,
    min_applicable_software_version: u32,
    max_applicable_software_version: u32,
    #[serde(default)]
    cd_version_number: u32,
    #[serde(default)]
    software_version_string: Option<String>,
    #[serde(default)]
    ota_url: Option<String>,
}

/// Catalog implementation for the DCL model version endpoints
pub struct DclCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl DclCatalog {
    /// Creates a new DclCatalog with a custom base URL
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        Self::with_timeout(base_url, Duration::from_millis(FETCH_TIMEOUT_MS))
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        Self::with_timeout(
            config.resolved_base_url(),
            Duration::from_millis(config.timeout),
        )
    }

    fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ota-candidates/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        model: ModelId,
    ) -> Result<T, CatalogError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(model.to_string()));
        }

        if !status.is_success() {
            warn!("DCL returned status {}: {}", status, url);
            return Err(CatalogError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse DCL response from {}: {}", url, e);
            CatalogError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl VersionCatalog for DclCatalog {
    async fn list_versions(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<u32>, CatalogError> {
        let model = ModelId::new(vendor_id, product_id);
        let url = format!("{}/{}/{}", self.base_url, vendor_id, product_id);

        let response: ModelVersionsResponse = self.get_json(&url, model).await?;
        debug!(
            "DCL lists {} versions for {}",
            response.model_versions.software_versions.len(),
            model
        );

        Ok(response.model_versions.software_versions)
    }

    async fn get_metadata(
        &self,
        vendor_id: u16,
        product_id: u16,
        version: u32,
        current_version: u32,
    ) -> Result<Option<CandidateRecord>, CatalogError> {
        let model = ModelId::new(vendor_id, product_id);
        let url = format!("{}/{}/{}/{}", self.base_url, vendor_id, product_id, version);

        let response: ModelVersionResponse = self.get_json(&url, model).await?;

        let Some(model_version) = response.model_version else {
            debug!("DCL has no modelVersion for {} v{}", model, version);
            return Ok(None);
        };

        let record = CandidateRecord::new(
            model,
            version,
            model_version.min_applicable_software_version,
            model_version.max_applicable_software_version,
        )
        .with_cd_version_number(model_version.cd_version_number)
        .with_version_string(model_version.software_version_string.as_deref().unwrap_or(""))
        .with_ota_url(model_version.ota_url.as_deref().unwrap_or(""));

        if !model_version.software_version_valid || !record.is_valid_for(current_version) {
            debug!(
                "{} v{} is not applicable from v{}",
                model, version, current_version
            );
            return Ok(None);
        }

        Ok(Some(record))
    }
}
