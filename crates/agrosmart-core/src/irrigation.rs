//! Irrigation service.
//!
//! [`Irrigator`] ties the decision rules to an injected [`ZoneStore`]. Every
//! operation the HTTP layer exposes goes through here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::decision::{DecisionMode, PumpDecision, decide};
use crate::reading::{Reading, SensorReport};
use crate::store::{StoreError, ZoneStore};
use crate::zone::{Zone, ZoneId, ZoneOverview, ZoneSettings};

/// Errors from irrigation operations.
#[derive(Debug, thiserror::Error)]
pub enum IrrigationError {
    /// Rejected before any state was touched.
    #[error(transparent)]
    Invalid(#[from] crate::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IrrigationError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::ZoneNotFound(_)))
    }
}

/// Irrigation service over a zone store.
#[derive(Debug, Clone)]
pub struct Irrigator<S> {
    store: S,
    mode: DecisionMode,
    seeds: Arc<[Zone]>,
}

impl<S: ZoneStore> Irrigator<S> {
    /// `seeds` are the zones restored by [`Irrigator::reset`].
    pub fn new(store: S, mode: DecisionMode, seeds: Vec<Zone>) -> Self {
        Self {
            store,
            mode,
            seeds: seeds.into(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create the configured zones that do not exist yet.
    pub async fn ensure_zones(&self) -> Result<(), IrrigationError> {
        self.store.ensure_zones(&self.seeds).await?;
        debug!(zones = self.seeds.len(), "Zones ensured");
        Ok(())
    }

    /// Store a sensor report and decide the pump command.
    pub async fn handle_report(
        &self,
        zone_id: ZoneId,
        report: SensorReport,
    ) -> Result<PumpDecision, IrrigationError> {
        report.validate()?;

        let reading = Reading::from_report(zone_id, &report, Utc::now());
        let mode = self.mode;
        let decision = self
            .store
            .commit_report(reading, move |zone| {
                decide(&report, zone.manual_pending, mode)
            })
            .await?;

        info!(
            zone = %zone_id,
            soil_moisture = report.soil_moisture,
            temperature = report.temperature,
            is_raining = report.is_raining,
            rule = %decision.rule,
            manual = decision.manual_consumed,
            pump_on = decision.pump_on,
            "Irrigation decision"
        );
        Ok(decision)
    }

    /// Flag a zone for watering on its next report.
    pub async fn request_watering(
        &self,
        zone_id: ZoneId,
        amount: u32,
    ) -> Result<Zone, IrrigationError> {
        let zone = self.store.set_manual_pending(zone_id, amount).await?;
        info!(zone = %zone_id, amount, "Manual watering requested");
        Ok(zone)
    }

    /// Overview of every zone, ordered by id.
    pub async fn overview(&self) -> Result<Vec<(ZoneId, ZoneOverview)>, IrrigationError> {
        let zones = self.store.list_zones().await?;
        let mut overview = Vec::with_capacity(zones.len());
        for zone in zones {
            let latest = self.store.get_latest(zone.id).await?;
            overview.push((zone.id, ZoneOverview::new(&zone, &latest)));
        }
        Ok(overview)
    }

    pub async fn zone_overview(&self, zone_id: ZoneId) -> Result<ZoneOverview, IrrigationError> {
        let zone = self.store.get_zone(zone_id).await?;
        let latest = self.store.get_latest(zone_id).await?;
        Ok(ZoneOverview::new(&zone, &latest))
    }

    /// Change crop and/or target moisture.
    pub async fn configure(
        &self,
        zone_id: ZoneId,
        settings: &ZoneSettings,
    ) -> Result<ZoneOverview, IrrigationError> {
        settings.validate()?;
        let zone = self.store.update_settings(zone_id, settings).await?;
        let latest = self.store.get_latest(zone_id).await?;
        info!(zone = %zone_id, crop = %zone.crop, target_moisture = zone.target_moisture, "Zone configured");
        Ok(ZoneOverview::new(&zone, &latest))
    }

    /// Restore the configured zones and drop every reading.
    pub async fn reset(&self) -> Result<(), IrrigationError> {
        self.store.reset(&self.seeds).await?;
        info!(zones = self.seeds.len(), "Zones reset");
        Ok(())
    }
}
