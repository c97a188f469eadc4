//! In-memory zone store.
//!
//! An arena of slots indexed by `zone_id - 1`. Each slot has its own mutex,
//! so reports for different zones never contend.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::{StoreError, ZoneStore};
use crate::decision::PumpDecision;
use crate::reading::{LatestReading, Reading};
use crate::zone::{Zone, ZoneId, ZoneSettings};

#[derive(Debug)]
struct ZoneSlot {
    zone: Zone,
    readings: Vec<Reading>,
}

impl ZoneSlot {
    fn new(zone: Zone) -> Self {
        Self {
            zone,
            readings: Vec::new(),
        }
    }

    /// Reading with the greatest timestamp; the later insert wins ties.
    fn latest(&self) -> LatestReading {
        self.readings
            .iter()
            .max_by_key(|r| r.recorded_at)
            .map_or_else(LatestReading::default, LatestReading::from)
    }
}

type Slot = Arc<Mutex<ZoneSlot>>;

/// Volatile store; everything is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<RwLock<Vec<Option<Slot>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, zone_id: ZoneId) -> Result<Slot, StoreError> {
        let index = zone_id.index().ok_or(StoreError::ZoneNotFound(zone_id))?;
        self.slots
            .read()
            .await
            .get(index)
            .cloned()
            .flatten()
            .ok_or(StoreError::ZoneNotFound(zone_id))
    }

    /// Number of readings held for a zone.
    pub async fn reading_count(&self, zone_id: ZoneId) -> Result<usize, StoreError> {
        let slot = self.slot(zone_id).await?;
        let count = slot.lock().await.readings.len();
        Ok(count)
    }
}

fn place(slots: &mut Vec<Option<Slot>>, zone: &Zone) -> Option<usize> {
    let index = zone.id.index()?;
    if index >= slots.len() {
        slots.resize_with(index + 1, || None);
    }
    Some(index)
}

impl ZoneStore for MemoryStore {
    async fn ensure_zones(&self, seeds: &[Zone]) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        for seed in seeds {
            let index = place(&mut slots, seed).ok_or(StoreError::ZoneNotFound(seed.id))?;
            if slots[index].is_none() {
                slots[index] = Some(Arc::new(Mutex::new(ZoneSlot::new(seed.clone()))));
            }
        }
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
        let slots: Vec<Slot> = self.slots.read().await.iter().flatten().cloned().collect();
        let mut zones = Vec::with_capacity(slots.len());
        for slot in slots {
            zones.push(slot.lock().await.zone.clone());
        }
        Ok(zones)
    }

    async fn get_zone(&self, zone_id: ZoneId) -> Result<Zone, StoreError> {
        let slot = self.slot(zone_id).await?;
        let zone = slot.lock().await.zone.clone();
        Ok(zone)
    }

    async fn get_latest(&self, zone_id: ZoneId) -> Result<LatestReading, StoreError> {
        let slot = self.slot(zone_id).await?;
        let latest = slot.lock().await.latest();
        Ok(latest)
    }

    async fn append(&self, reading: Reading) -> Result<(), StoreError> {
        let slot = self.slot(reading.zone_id).await?;
        slot.lock().await.readings.push(reading);
        Ok(())
    }

    async fn set_manual_pending(&self, zone_id: ZoneId, amount: u32) -> Result<Zone, StoreError> {
        let cell = self.slot(zone_id).await?;
        let mut slot = cell.lock().await;
        slot.zone.manual_pending = true;
        slot.zone.manual_water_level = amount;
        Ok(slot.zone.clone())
    }

    async fn update_settings(
        &self,
        zone_id: ZoneId,
        settings: &ZoneSettings,
    ) -> Result<Zone, StoreError> {
        let cell = self.slot(zone_id).await?;
        let mut slot = cell.lock().await;
        slot.zone.apply(settings);
        Ok(slot.zone.clone())
    }

    async fn commit_report<F>(&self, reading: Reading, decide: F) -> Result<PumpDecision, StoreError>
    where
        F: FnOnce(&Zone) -> PumpDecision + Send,
    {
        let cell = self.slot(reading.zone_id).await?;
        let mut slot = cell.lock().await;
        let decision = decide(&slot.zone);
        slot.readings.push(reading);
        if decision.manual_consumed {
            slot.zone.manual_pending = false;
        }
        Ok(decision)
    }

    async fn reset(&self, seeds: &[Zone]) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        for slot in slots.iter().flatten() {
            slot.lock().await.readings.clear();
        }
        for seed in seeds {
            let index = place(&mut slots, seed).ok_or(StoreError::ZoneNotFound(seed.id))?;
            let slot = slots[index]
                .get_or_insert_with(|| Arc::new(Mutex::new(ZoneSlot::new(seed.clone()))))
                .clone();
            slot.lock().await.zone = seed.clone();
        }
        Ok(())
    }
}
