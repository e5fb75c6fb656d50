use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::error::EngineError;

// =============================================================================
// Registry endpoints
// =============================================================================

/// Model versions endpoint on the DCL main network
pub const DCL_MAIN_NET_BASE_URL: &str = "https://on.dcl.csa-iot.org/dcl/model/versions";

/// Model versions endpoint on the DCL test network
pub const DCL_TEST_NET_BASE_URL: &str = "https://on.test-net.dcl.csa-iot.org/dcl/model/versions";

// =============================================================================
// Record limits
// =============================================================================

/// Maximum stored length of `softwareVersionString`, in bytes
pub const MAX_SOFTWARE_VERSION_STRING_LEN: usize = 64;

/// Maximum stored length of `otaUrl`, in bytes
pub const MAX_OTA_URL_LEN: usize = 256;

// =============================================================================
// Engine defaults
// =============================================================================

/// Default number of candidate slots
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// Default number of requests that may wait for the worker
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Default refresh sweep interval in milliseconds (24 hours)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Timeout for a single registry request in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Engine configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Number of candidate slots held in memory
    pub cache_capacity: usize,
    /// Bound of the inbound request queue
    pub queue_depth: usize,
    /// Refresh sweep interval in milliseconds
    pub refresh_interval: u64,
    pub catalog: CatalogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            refresh_interval: DEFAULT_REFRESH_INTERVAL_MS,
            catalog: CatalogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.cache_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "cacheCapacity must be at least 1".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "queueDepth must be at least 1".to_string(),
            ));
        }
        if self.refresh_interval == 0 {
            return Err(EngineError::InvalidConfig(
                "refreshInterval must be greater than 0".to_string(),
            ));
        }
        if self.catalog.timeout == 0 {
            return Err(EngineError::InvalidConfig(
                "catalog.timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which DCL network to query
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DclNetwork {
    #[default]
    Main,
    Test,
}

impl DclNetwork {
    pub fn base_url(&self) -> &'static str {
        match self {
            DclNetwork::Main => DCL_MAIN_NET_BASE_URL,
            DclNetwork::Test => DCL_TEST_NET_BASE_URL,
        }
    }
}

/// Remote catalog configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    pub network: DclNetwork,
    /// Overrides the network endpoint when set
    pub base_url: Option<String>,
    /// Request timeout in milliseconds
    pub timeout: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            network: DclNetwork::default(),
            base_url: None,
            timeout: FETCH_TIMEOUT_MS,
        }
    }
}

impl CatalogConfig {
    /// Returns the endpoint requests are sent to.
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.network.base_url())
    }
}

/// Returns the path to the data directory for ota-candidates.
/// Uses $XDG_DATA_HOME/ota-candidates if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/ota-candidates,
/// or ./ota-candidates if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("ota-candidates.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("ota-candidates")
}
