//! Row types for the `SQLite` zone store.

use crate::db::{DatabaseError, from_unix_millis};
use crate::reading::LatestReading;
use crate::zone::{Zone, ZoneId};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct ZoneRow {
    pub id: i64,
    pub crop: String,
    pub target_moisture: f64,
    pub manual_pending: bool,
    pub manual_water_level: i64,
}

impl TryFrom<ZoneRow> for Zone {
    type Error = DatabaseError;

    fn try_from(row: ZoneRow) -> Result<Self, Self::Error> {
        let id = u32::try_from(row.id)
            .map_err(|_| DatabaseError::Corrupt(format!("zone id {}", row.id)))?;
        let manual_water_level = u32::try_from(row.manual_water_level).map_err(|_| {
            DatabaseError::Corrupt(format!(
                "zone {id} manual_water_level {}",
                row.manual_water_level
            ))
        })?;
        Ok(Self {
            id: ZoneId(id),
            crop: row.crop,
            target_moisture: row.target_moisture,
            manual_pending: row.manual_pending,
            manual_water_level,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct LatestRow {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_raining: bool,
    pub recorded_at: i64,
}

impl TryFrom<LatestRow> for LatestReading {
    type Error = DatabaseError;

    fn try_from(row: LatestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            temperature: row.temperature,
            humidity: row.humidity,
            soil_moisture: row.soil_moisture,
            is_raining: row.is_raining,
            recorded_at: Some(from_unix_millis(row.recorded_at)?),
        })
    }
}
