//! Process-wide engine instance
//!
//! Thin facade over a single [`Dispatcher`] for callers that cannot thread a
//! handle through. Initialization happens once per process.

use std::sync::{Arc, OnceLock};

use crate::catalog::registry::VersionCatalog;
use crate::engine::dispatcher::Dispatcher;
use crate::engine::error::EngineError;
use crate::engine::resolver::Outcome;

static DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Allocates the cache and starts the worker on the current tokio runtime.
///
/// Fails with [`EngineError::AlreadyInitialized`] on every call after the first
/// successful one, and with [`EngineError::NoRuntime`] outside a runtime.
pub fn init(
    capacity: usize,
    queue_depth: usize,
    catalog: Arc<dyn VersionCatalog>,
) -> Result<(), EngineError> {
    if DISPATCHER.get().is_some() {
        return Err(EngineError::AlreadyInitialized);
    }

    // The worker runs detached for the rest of the process
    let (dispatcher, _worker) = Dispatcher::start(capacity, queue_depth, catalog)?;
    DISPATCHER
        .set(dispatcher)
        .map_err(|_| EngineError::AlreadyInitialized)
}

/// Returns the process-wide dispatcher.
pub fn dispatcher() -> Result<&'static Dispatcher, EngineError> {
    DISPATCHER.get().ok_or(EngineError::NotInitialized)
}

/// Enqueues a lookup. Fails without enqueuing if [`init`] has not run.
pub async fn resolve<F>(
    vendor_id: u16,
    product_id: u16,
    current_version: u32,
    completion: F,
) -> Result<(), EngineError>
where
    F: FnOnce(Outcome) + Send + 'static,
{
    dispatcher()?
        .resolve(vendor_id, product_id, current_version, completion)
        .await
}

/// Enqueues a lookup and waits for its outcome.
pub async fn fetch(
    vendor_id: u16,
    product_id: u16,
    current_version: u32,
) -> Result<Outcome, EngineError> {
    dispatcher()?
        .fetch(vendor_id, product_id, current_version)
        .await
}

/// Enqueues a refresh sweep. Meant for the periodic timer, not device lookups.
pub async fn trigger_refresh_sweep() -> Result<(), EngineError> {
    dispatcher()?.trigger_refresh_sweep().await
}
