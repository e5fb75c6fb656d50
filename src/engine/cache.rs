//! Fixed-capacity candidate cache
//!
//! Slots are admitted in order and carry a staleness counter instead of a
//! timestamp: every admission resets the new slot to 0 and ages every other
//! occupied slot by one. When no slot is free, the stalest slot is evicted.
//! Capacity is small, so every operation is a linear scan.

use tracing::debug;

use crate::catalog::types::{CandidateRecord, ModelId};

/// An occupied cache slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCandidate {
    pub record: CandidateRecord,
    pub staleness: u8,
}

pub struct CandidateCache {
    slots: Box<[Option<CachedCandidate>]>,
}

impl CandidateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Raw slot table, in index order
    pub fn slots(&self) -> &[Option<CachedCandidate>] {
        &self.slots
    }

    /// Occupied slots, in index order
    pub fn entries(&self) -> impl Iterator<Item = &CachedCandidate> {
        self.slots.iter().flatten()
    }

    fn position(&self, model: ModelId) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|entry| entry.record.model() == model)
        })
    }

    pub fn find(&self, vendor_id: u16, product_id: u16) -> Option<&CandidateRecord> {
        let index = self.position(ModelId::new(vendor_id, product_id))?;
        self.slots[index].as_ref().map(|entry| &entry.record)
    }

    pub fn staleness(&self, vendor_id: u16, product_id: u16) -> Option<u8> {
        let index = self.position(ModelId::new(vendor_id, product_id))?;
        self.slots[index].as_ref().map(|entry| entry.staleness)
    }

    /// Occupied slot with the highest staleness; the lowest index wins ties.
    fn stalest_slot(&self) -> Option<usize> {
        let mut stalest: Option<(usize, u8)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(entry) = slot else {
                continue;
            };
            match stalest {
                Some((_, staleness)) if entry.staleness <= staleness => {}
                _ => stalest = Some((index, entry.staleness)),
            }
        }
        stalest.map(|(index, _)| index)
    }

    /// Stores `record` with staleness 0, evicting the stalest slot when full.
    ///
    /// The record's model must not already be cached; callers invalidate first.
    /// Returns the evicted record, if any.
    pub fn admit(&mut self, record: CandidateRecord) -> Option<CandidateRecord> {
        debug_assert!(
            self.position(record.model()).is_none(),
            "{} is already cached",
            record.model()
        );

        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => index,
            None => self.stalest_slot()?,
        };

        let evicted = self.slots[index].take().map(|entry| entry.record);
        if let Some(evicted) = &evicted {
            debug!(
                "Evicting {} v{} from slot {}",
                evicted.model(),
                evicted.software_version,
                index
            );
        }

        for entry in self.slots.iter_mut().flatten() {
            entry.staleness = entry.staleness.saturating_add(1);
        }

        debug!(
            "Admitting {} v{} into slot {}",
            record.model(),
            record.software_version,
            index
        );
        self.slots[index] = Some(CachedCandidate {
            record,
            staleness: 0,
        });

        evicted
    }

    /// Clears the slot for a model. Returns whether a slot was cleared.
    pub fn invalidate(&mut self, vendor_id: u16, product_id: u16) -> bool {
        let model = ModelId::new(vendor_id, product_id);
        match self.position(model) {
            Some(index) => {
                debug!("Invalidating {} in slot {}", model, index);
                self.slots[index] = None;
                true
            }
            None => false,
        }
    }

    /// Replaces the record of an occupied slot without touching any staleness.
    /// Returns false when the model is not cached.
    pub fn update_in_place(
        &mut self,
        vendor_id: u16,
        product_id: u16,
        record: CandidateRecord,
    ) -> bool {
        let model = ModelId::new(vendor_id, product_id);
        debug_assert_eq!(record.model(), model);

        let Some(entry) = self
            .position(model)
            .and_then(|index| self.slots[index].as_mut())
        else {
            return false;
        };

        debug!(
            "Updating {} from v{} to v{}",
            model, entry.record.software_version, record.software_version
        );
        entry.record = record;
        true
    }
}
