//! In-memory catalog test utilities

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use ota_candidates::catalog::error::CatalogError;
use ota_candidates::catalog::registry::VersionCatalog;
use ota_candidates::catalog::types::{CandidateRecord, ModelId};

/// Record applicable from every version in `min..=max`
pub fn candidate(
    vendor_id: u16,
    product_id: u16,
    software_version: u32,
    min: u32,
    max: u32,
) -> CandidateRecord {
    CandidateRecord::new(
        ModelId::new(vendor_id, product_id),
        software_version,
        min,
        max,
    )
    .with_version_string(&format!("{}.0.0", software_version))
    .with_ota_url(&format!(
        "https://firmware.example.com/{}/{}/{}.ota",
        vendor_id, product_id, software_version
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogCall {
    List(u16, u16),
    Metadata(u16, u16, u32, u32),
}

/// Catalog answering from in-memory tables
///
/// `get_metadata` behaves like the registry: a published record is returned
/// only when it is applicable from the caller's current version. Calls can be
/// held back with [`FakeCatalog::close_gate`] to simulate a hung registry.
pub struct FakeCatalog {
    versions: Mutex<HashMap<(u16, u16), Vec<u32>>>,
    records: Mutex<HashMap<(u16, u16, u32), CandidateRecord>>,
    unreachable: AtomicBool,
    gate: watch::Sender<bool>,
    calls: Mutex<Vec<CatalogCall>>,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            versions: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            unreachable: AtomicBool::new(false),
            gate,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_versions(self, vendor_id: u16, product_id: u16, versions: &[u32]) -> Self {
        self.set_versions(vendor_id, product_id, versions);
        self
    }

    pub fn with_record(self, record: CandidateRecord) -> Self {
        self.publish(record);
        self
    }

    pub fn set_versions(&self, vendor_id: u16, product_id: u16, versions: &[u32]) {
        self.versions
            .lock()
            .unwrap()
            .insert((vendor_id, product_id), versions.to_vec());
    }

    pub fn publish(&self, record: CandidateRecord) {
        self.records.lock().unwrap().insert(
            (record.vendor_id, record.product_id, record.software_version),
            record,
        );
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn enter(&self, call: CatalogCall) -> Result<(), CatalogError> {
        self.calls.lock().unwrap().push(call);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CatalogError::InvalidResponse(
                "registry unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VersionCatalog for FakeCatalog {
    async fn list_versions(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<u32>, CatalogError> {
        self.enter(CatalogCall::List(vendor_id, product_id)).await?;

        match self.versions.lock().unwrap().get(&(vendor_id, product_id)) {
            Some(versions) => Ok(versions.clone()),
            None => Err(CatalogError::NotFound(format!("{}/{}", vendor_id, product_id))),
        }
    }

    async fn get_metadata(
        &self,
        vendor_id: u16,
        product_id: u16,
        version: u32,
        current_version: u32,
    ) -> Result<Option<CandidateRecord>, CatalogError> {
        self.enter(CatalogCall::Metadata(
            vendor_id,
            product_id,
            version,
            current_version,
        ))
        .await?;

        let records = self.records.lock().unwrap();
        Ok(records
            .get(&(vendor_id, product_id, version))
            .filter(|record| record.is_valid_for(current_version))
            .cloned())
    }
}
