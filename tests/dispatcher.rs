//! Request queue and worker tests

mod helper;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::time::timeout;

use helper::{CatalogCall, FakeCatalog, candidate};
use ota_candidates::engine::error::EngineError;
use ota_candidates::engine::{Dispatcher, Outcome};

/// Catalog with one applicable candidate per model (1..=n, 1..=n)
fn catalog_with_models(n: u16) -> FakeCatalog {
    (1..=n).fold(FakeCatalog::new(), |catalog, id| {
        catalog
            .with_versions(id, id, &[2])
            .with_record(candidate(id, id, 2, 0, 1))
    })
}

/// Polls until the catalog has seen `count` calls
async fn wait_for_calls(catalog: &FakeCatalog, count: usize) {
    timeout(Duration::from_secs(5), async {
        while catalog.calls().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("catalog calls did not arrive in time");
}

#[tokio::test]
async fn lookups_complete_in_submission_order() {
    let catalog = Arc::new(catalog_with_models(3));
    let (dispatcher, worker) = Dispatcher::start(4, 8, catalog.clone()).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    for id in [3u16, 1, 2] {
        let order = order.clone();
        dispatcher
            .resolve(id, id, 1, move |_| order.lock().unwrap().push(id))
            .await
            .unwrap();
    }

    drop(dispatcher);
    worker.await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec![3, 1, 2]);
}

#[tokio::test]
async fn completion_runs_after_submission_returns() {
    let catalog = Arc::new(catalog_with_models(1));
    catalog.close_gate();
    let (dispatcher, _worker) = Dispatcher::start(4, 8, catalog.clone()).unwrap();

    let (tx, rx) = oneshot::channel();
    dispatcher
        .resolve(1, 1, 1, move |outcome| {
            let _ = tx.send(outcome);
        })
        .await
        .unwrap();

    // The worker is parked in the catalog, so nothing has been delivered yet
    wait_for_calls(&catalog, 1).await;
    let mut rx = rx;
    assert!(rx.try_recv().is_err());

    catalog.open_gate();
    let outcome = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Available(candidate(1, 1, 2, 0, 1)));
}

#[tokio::test]
async fn sweep_waits_behind_pending_lookups() {
    let catalog = Arc::new(catalog_with_models(2));
    let (dispatcher, worker) = Dispatcher::start(4, 8, catalog.clone()).unwrap();

    // Populate the cache with (1,1)
    dispatcher.fetch(1, 1, 1).await.unwrap();
    catalog.clear_calls();
    catalog.close_gate();

    dispatcher.resolve(2, 2, 1, |_| {}).await.unwrap();
    dispatcher.trigger_refresh_sweep().await.unwrap();

    catalog.open_gate();
    drop(dispatcher);
    worker.await.unwrap();

    assert_eq!(
        catalog.calls(),
        vec![
            // lookup for (2,2)
            CatalogCall::List(2, 2),
            CatalogCall::Metadata(2, 2, 2, 1),
            // sweep over both cached models, nothing newer than v2
            CatalogCall::List(1, 1),
            CatalogCall::List(2, 2),
        ]
    );
}

#[tokio::test]
async fn hung_catalog_call_stalls_queued_requests() {
    let catalog = Arc::new(catalog_with_models(3));
    catalog.close_gate();
    let (dispatcher, _worker) = Dispatcher::start(4, 1, catalog.clone()).unwrap();

    // Taken by the worker, which then blocks inside the catalog
    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.fetch(1, 1, 1).await }
    });
    wait_for_calls(&catalog, 1).await;

    // Fills the single queue slot
    dispatcher.resolve(2, 2, 1, |_| {}).await.unwrap();

    // Neither a further lookup nor the sweep trigger can be enqueued
    let blocked = timeout(
        Duration::from_millis(100),
        dispatcher.resolve(3, 3, 1, |_| {}),
    )
    .await;
    assert!(blocked.is_err());
    let blocked = timeout(Duration::from_millis(100), dispatcher.trigger_refresh_sweep()).await;
    assert!(blocked.is_err());
    assert_eq!(catalog.calls(), vec![CatalogCall::List(1, 1)]);

    catalog.open_gate();
    let outcome = timeout(Duration::from_secs(5), first)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Outcome::Available(candidate(1, 1, 2, 0, 1)));

    let third = timeout(Duration::from_secs(5), dispatcher.fetch(3, 3, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(third, Outcome::Available(candidate(3, 3, 2, 0, 1)));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_callers_each_receive_one_outcome() {
    let catalog = Arc::new(catalog_with_models(4));
    let (dispatcher, _worker) = Dispatcher::start(2, 2, catalog.clone()).unwrap();

    let lookups = (0..16u16).map(|i| {
        let dispatcher = dispatcher.clone();
        let id = i % 4 + 1;
        async move { (id, dispatcher.fetch(id, id, 1).await.unwrap()) }
    });
    let results = join_all(lookups).await;

    assert_eq!(results.len(), 16);
    for (id, outcome) in results {
        assert_eq!(outcome, Outcome::Available(candidate(id, id, 2, 0, 1)));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_callers_on_plain_threads_are_served() {
    let catalog = Arc::new(catalog_with_models(3));
    let (dispatcher, _worker) = Dispatcher::start(2, 2, catalog.clone()).unwrap();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = (1..=3u16)
        .map(|id| {
            let dispatcher = dispatcher.clone();
            let delivered = delivered.clone();
            std::thread::spawn(move || {
                dispatcher
                    .blocking_resolve(id, id, 1, move |outcome| {
                        delivered.lock().unwrap().push((id, outcome));
                    })
                    .unwrap();
            })
        })
        .collect();

    tokio::task::spawn_blocking(move || {
        for handle in handles {
            handle.join().unwrap();
        }
    })
    .await
    .unwrap();

    timeout(Duration::from_secs(5), async {
        while delivered.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let mut delivered = delivered.lock().unwrap().clone();
    delivered.sort_by_key(|(id, _)| *id);
    for (id, outcome) in delivered {
        assert_eq!(outcome, Outcome::Available(candidate(id, id, 2, 0, 1)));
    }
}

#[tokio::test]
async fn submissions_fail_after_worker_stops() {
    let catalog = Arc::new(FakeCatalog::new());
    let (dispatcher, worker) = Dispatcher::start(2, 2, catalog).unwrap();

    worker.abort();
    let _ = worker.await;

    let result = dispatcher.resolve(1, 1, 1, |_| {}).await;
    assert!(matches!(result, Err(EngineError::WorkerStopped)));
}
