//! `SQLite` zone store.

use std::path::Path;

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::info;

use super::models::{LatestRow, ZoneRow};
use super::{StoreError, ZoneStore};
use crate::db::{DatabaseError, open_pool, open_pool_in_memory, to_unix_millis};
use crate::decision::PumpDecision;
use crate::reading::{LatestReading, Reading};
use crate::zone::{Zone, ZoneId, ZoneSettings};

/// Durable store; a reading is persisted once its transaction commits.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, DatabaseError> {
        let pool = open_pool(path).await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = open_pool_in_memory().await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Zone store migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Number of readings held for a zone.
    pub async fn reading_count(&self, zone_id: ZoneId) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings WHERE zone_id = ?")
            .bind(i64::from(zone_id.0))
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

/// Bump the zone's `updated_at`. Being a write, this takes the database write
/// lock for the rest of the transaction.
async fn touch_zone(conn: &mut SqliteConnection, zone_id: ZoneId) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE zones SET updated_at = ? WHERE id = ?")
        .bind(to_unix_millis(Utc::now()))
        .bind(i64::from(zone_id.0))
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ZoneNotFound(zone_id));
    }
    Ok(())
}

async fn insert_reading(conn: &mut SqliteConnection, reading: &Reading) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO readings (zone_id, temperature, humidity, soil_moisture, is_raining, recorded_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(i64::from(reading.zone_id.0))
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(reading.soil_moisture)
    .bind(reading.is_raining)
    .bind(to_unix_millis(reading.recorded_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_seed(conn: &mut SqliteConnection, seed: &Zone, overwrite: bool) -> Result<(), StoreError> {
    let sql = if overwrite {
        "INSERT INTO zones (id, crop, target_moisture, manual_pending, manual_water_level, updated_at) VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET crop = excluded.crop, target_moisture = excluded.target_moisture, \
         manual_pending = excluded.manual_pending, manual_water_level = excluded.manual_water_level, updated_at = excluded.updated_at"
    } else {
        "INSERT OR IGNORE INTO zones (id, crop, target_moisture, manual_pending, manual_water_level, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
    };
    sqlx::query(sql)
        .bind(i64::from(seed.id.0))
        .bind(&seed.crop)
        .bind(seed.target_moisture)
        .bind(seed.manual_pending)
        .bind(i64::from(seed.manual_water_level))
        .bind(to_unix_millis(Utc::now()))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl ZoneStore for SqliteStore {
    async fn ensure_zones(&self, seeds: &[Zone]) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        for seed in seeds {
            upsert_seed(&mut tx, seed, false).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
        let rows = sqlx::query_as::<_, ZoneRow>("SELECT * FROM zones ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        let zones = rows
            .into_iter()
            .map(Zone::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(zones)
    }

    async fn get_zone(&self, zone_id: ZoneId) -> Result<Zone, StoreError> {
        let row = sqlx::query_as::<_, ZoneRow>("SELECT * FROM zones WHERE id = ?")
            .bind(i64::from(zone_id.0))
            .fetch_optional(self.pool())
            .await?
            .ok_or(StoreError::ZoneNotFound(zone_id))?;
        Ok(Zone::try_from(row)?)
    }

    async fn get_latest(&self, zone_id: ZoneId) -> Result<LatestReading, StoreError> {
        let row = sqlx::query_as::<_, LatestRow>(
            "SELECT temperature, humidity, soil_moisture, is_raining, recorded_at FROM readings \
             WHERE zone_id = ? ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .bind(i64::from(zone_id.0))
        .fetch_optional(self.pool())
        .await?;

        if let Some(row) = row {
            return Ok(LatestReading::try_from(row)?);
        }

        // No readings: distinguish a fresh zone from an unknown one.
        self.get_zone(zone_id).await?;
        Ok(LatestReading::default())
    }

    async fn append(&self, reading: Reading) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        touch_zone(&mut tx, reading.zone_id).await?;
        insert_reading(&mut tx, &reading).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_manual_pending(&self, zone_id: ZoneId, amount: u32) -> Result<Zone, StoreError> {
        let row = sqlx::query_as::<_, ZoneRow>(
            "UPDATE zones SET manual_pending = 1, manual_water_level = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(i64::from(amount))
        .bind(to_unix_millis(Utc::now()))
        .bind(i64::from(zone_id.0))
        .fetch_optional(self.pool())
        .await?
        .ok_or(StoreError::ZoneNotFound(zone_id))?;
        Ok(Zone::try_from(row)?)
    }

    async fn update_settings(
        &self,
        zone_id: ZoneId,
        settings: &ZoneSettings,
    ) -> Result<Zone, StoreError> {
        let crop = settings.crop.as_deref().map(str::trim);
        let row = sqlx::query_as::<_, ZoneRow>(
            "UPDATE zones SET crop = COALESCE(?, crop), target_moisture = COALESCE(?, target_moisture), updated_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(crop)
        .bind(settings.target_moisture)
        .bind(to_unix_millis(Utc::now()))
        .bind(i64::from(zone_id.0))
        .fetch_optional(self.pool())
        .await?
        .ok_or(StoreError::ZoneNotFound(zone_id))?;
        Ok(Zone::try_from(row)?)
    }

    async fn commit_report<F>(&self, reading: Reading, decide: F) -> Result<PumpDecision, StoreError>
    where
        F: FnOnce(&Zone) -> PumpDecision + Send,
    {
        let zone_id = reading.zone_id;
        let mut tx = self.pool().begin().await?;

        // Write first so no other writer can slip in before commit.
        touch_zone(&mut tx, zone_id).await?;

        let row = sqlx::query_as::<_, ZoneRow>("SELECT * FROM zones WHERE id = ?")
            .bind(i64::from(zone_id.0))
            .fetch_one(&mut *tx)
            .await?;
        let zone = Zone::try_from(row)?;

        insert_reading(&mut tx, &reading).await?;
        let decision = decide(&zone);
        if decision.manual_consumed {
            sqlx::query("UPDATE zones SET manual_pending = 0 WHERE id = ?")
                .bind(i64::from(zone_id.0))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(decision)
    }

    async fn reset(&self, seeds: &[Zone]) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM readings").execute(&mut *tx).await?;
        for seed in seeds {
            upsert_seed(&mut tx, seed, true).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
