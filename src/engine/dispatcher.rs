//! Single-consumer request queue in front of the resolution engine
//!
//! Any number of callers hold a cloned [`Dispatcher`] and submit requests into
//! one bounded channel. A single worker task owns the [`ResolutionEngine`] and
//! drains the channel in arrival order, so the cache and every registry call
//! are serialized without locks.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::catalog::registry::VersionCatalog;
use crate::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::resolver::{Outcome, ResolutionEngine};

/// Callback invoked exactly once, on the worker task, with the lookup result
pub type Completion = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// A point lookup for one device
pub struct FetchRequest {
    pub vendor_id: u16,
    pub product_id: u16,
    pub current_version: u32,
    pub completion: Completion,
}

/// Work item consumed by the worker
pub enum Request {
    Lookup(FetchRequest),
    /// Advance every cached candidate; nobody waits on it
    Sweep,
}

/// Cloneable handle for submitting requests to the worker
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Request>,
}

impl Dispatcher {
    /// Allocates the cache and spawns the worker on the current tokio runtime.
    ///
    /// Fails with [`EngineError::NoRuntime`] when called outside a runtime.
    /// The worker stops once every `Dispatcher` clone has been dropped and the
    /// queue is drained.
    pub fn start(
        capacity: usize,
        queue_depth: usize,
        catalog: Arc<dyn VersionCatalog>,
    ) -> Result<(Self, JoinHandle<()>), EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "cache capacity must be at least 1".to_string(),
            ));
        }
        if queue_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "queue depth must be at least 1".to_string(),
            ));
        }

        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let (sender, receiver) = mpsc::channel(queue_depth);
        let engine = ResolutionEngine::new(catalog, capacity);

        info!(
            "Starting candidate worker (capacity {}, queue depth {})",
            capacity, queue_depth
        );
        let worker = runtime.spawn(run_worker(engine, receiver));

        Ok((Self { sender }, worker))
    }

    pub fn from_config(
        config: &EngineConfig,
        catalog: Arc<dyn VersionCatalog>,
    ) -> Result<(Self, JoinHandle<()>), EngineError> {
        config.validate()?;
        Self::start(config.cache_capacity, config.queue_depth, catalog)
    }

    async fn submit(&self, request: Request) -> Result<(), EngineError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| EngineError::WorkerStopped)
    }

    /// Enqueues a lookup. Waits while the queue is full, with no timeout.
    ///
    /// `completion` runs later on the worker task, never inside this call.
    pub async fn resolve<F>(
        &self,
        vendor_id: u16,
        product_id: u16,
        current_version: u32,
        completion: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.submit(Request::Lookup(FetchRequest {
            vendor_id,
            product_id,
            current_version,
            completion: Box::new(completion),
        }))
        .await
    }

    /// Blocking variant of [`Dispatcher::resolve`] for callers outside the
    /// async runtime. Panics if called from within an async context.
    pub fn blocking_resolve<F>(
        &self,
        vendor_id: u16,
        product_id: u16,
        current_version: u32,
        completion: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.sender
            .blocking_send(Request::Lookup(FetchRequest {
                vendor_id,
                product_id,
                current_version,
                completion: Box::new(completion),
            }))
            .map_err(|_| EngineError::WorkerStopped)
    }

    /// Enqueues a lookup and waits for its outcome.
    pub async fn fetch(
        &self,
        vendor_id: u16,
        product_id: u16,
        current_version: u32,
    ) -> Result<Outcome, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.resolve(vendor_id, product_id, current_version, move |outcome| {
            let _ = tx.send(outcome);
        })
        .await?;
        rx.await.map_err(|_| EngineError::WorkerStopped)
    }

    /// Enqueues a refresh sweep behind any pending lookups.
    pub async fn trigger_refresh_sweep(&self) -> Result<(), EngineError> {
        self.submit(Request::Sweep).await
    }
}

async fn run_worker(mut engine: ResolutionEngine, mut receiver: mpsc::Receiver<Request>) {
    while let Some(request) = receiver.recv().await {
        match request {
            Request::Lookup(FetchRequest {
                vendor_id,
                product_id,
                current_version,
                completion,
            }) => {
                let outcome = engine
                    .resolve(vendor_id, product_id, current_version)
                    .await;
                // A panicking caller callback must not take the worker down
                if std::panic::catch_unwind(AssertUnwindSafe(|| completion(outcome))).is_err() {
                    error!(
                        "Completion handler for {}/{} panicked",
                        vendor_id, product_id
                    );
                }
            }
            Request::Sweep => {
                debug!("Running refresh sweep");
                engine.refresh_sweep().await;
            }
        }
    }

    info!("All dispatcher handles dropped, stopping candidate worker");
}

/// Starts the periodic refresh trigger
///
/// Enqueues one sweep per `period`, starting one period from now. Stops when
/// `shutdown_rx` turns true (or its sender is dropped) or the worker is gone.
pub fn spawn_refresh_timer(
    dispatcher: Dispatcher,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!("Starting refresh timer every {:?}", period);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Stopping refresh timer");
                        break;
                    }
                    continue;
                }
            }

            if dispatcher.trigger_refresh_sweep().await.is_err() {
                warn!("Candidate worker stopped, stopping refresh timer");
                break;
            }
        }
    })
}
