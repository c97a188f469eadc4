//! Zone storage.
//!
//! [`ZoneStore`] is the capability the irrigation service is built on. Two
//! implementations exist: [`MemoryStore`], an arena of per-zone slots, and
//! [`SqliteStore`], backed by a `SQLite` pool with embedded migrations.
//!
//! Zones are independent: no operation locks more than one zone.

mod memory;
mod models;
mod sqlite;

#[cfg(test)]
mod tests;

use std::future::Future;

use crate::db::DatabaseError;
use crate::decision::PumpDecision;
use crate::reading::{LatestReading, Reading};
use crate::zone::{Zone, ZoneId, ZoneSettings};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Zone {0} not found")]
    ZoneNotFound(ZoneId),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.into())
    }
}

/// Persistence capability for zones and their readings.
pub trait ZoneStore: Send + Sync {
    /// Create any zone in `seeds` that does not exist yet. Existing zones are
    /// left untouched.
    fn ensure_zones(&self, seeds: &[Zone]) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All zones, ordered by id.
    fn list_zones(&self) -> impl Future<Output = Result<Vec<Zone>, StoreError>> + Send;

    fn get_zone(&self, zone_id: ZoneId) -> impl Future<Output = Result<Zone, StoreError>> + Send;

    /// Latest reading for a zone, or the zero default when it has none.
    fn get_latest(
        &self,
        zone_id: ZoneId,
    ) -> impl Future<Output = Result<LatestReading, StoreError>> + Send;

    /// Append a reading without running a decision.
    fn append(&self, reading: Reading) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Mark a manual watering request as pending. Setting an already pending
    /// flag is a no-op apart from updating the requested amount.
    fn set_manual_pending(
        &self,
        zone_id: ZoneId,
        amount: u32,
    ) -> impl Future<Output = Result<Zone, StoreError>> + Send;

    /// Apply crop/target changes. `settings` must already be validated.
    fn update_settings(
        &self,
        zone_id: ZoneId,
        settings: &ZoneSettings,
    ) -> impl Future<Output = Result<Zone, StoreError>> + Send;

    /// Append `reading`, run `decide` on the zone state and clear the manual
    /// flag if the decision consumed it, as one atomic unit. A manual request
    /// for the same zone issued meanwhile is applied after this completes.
    fn commit_report<F>(
        &self,
        reading: Reading,
        decide: F,
    ) -> impl Future<Output = Result<PumpDecision, StoreError>> + Send
    where
        F: FnOnce(&Zone) -> PumpDecision + Send;

    /// Restore every zone in `seeds` to its seed state and drop all readings.
    fn reset(&self, seeds: &[Zone]) -> impl Future<Output = Result<(), StoreError>> + Send;
}
