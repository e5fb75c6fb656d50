use thiserror::Error;

use crate::catalog::error::CatalogError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine already initialized")]
    AlreadyInitialized,

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    Config(String),

    #[error("No tokio runtime available to run the worker")]
    NoRuntime,

    #[error("Worker is no longer running")]
    WorkerStopped,

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}
