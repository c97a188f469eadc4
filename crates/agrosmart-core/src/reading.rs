//! Sensor readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::zone::ZoneId;

/// Body of a sensor report as sent by a zone node. Every field is required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    /// Air temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
    /// Soil moisture in %.
    pub soil_moisture: f64,
    pub is_raining: bool,
}

impl SensorReport {
    /// Reject values the decision rules cannot meaningfully evaluate.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("soil_moisture", self.soil_moisture),
        ] {
            if !value.is_finite() {
                return Err(Error::Validation(format!("{name} must be a finite number")));
            }
        }
        if !(0.0..=100.0).contains(&self.soil_moisture) {
            return Err(Error::Validation(format!(
                "soil_moisture must be between 0 and 100, got {}",
                self.soil_moisture
            )));
        }
        if !(0.0..=100.0).contains(&self.humidity) {
            return Err(Error::Validation(format!(
                "humidity must be between 0 and 100, got {}",
                self.humidity
            )));
        }
        Ok(())
    }
}

/// A stored reading. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub zone_id: ZoneId,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_raining: bool,
    /// Assigned by the service on receipt.
    pub recorded_at: DateTime<Utc>,
}

impl Reading {
    pub fn from_report(
        zone_id: ZoneId,
        report: &SensorReport,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            zone_id,
            temperature: report.temperature,
            humidity: report.humidity,
            soil_moisture: report.soil_moisture,
            is_raining: report.is_raining,
            recorded_at,
        }
    }
}

/// Latest values for a zone; all zero with no timestamp before the first report.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatestReading {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_raining: bool,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl From<&Reading> for LatestReading {
    fn from(r: &Reading) -> Self {
        Self {
            temperature: r.temperature,
            humidity: r.humidity,
            soil_moisture: r.soil_moisture,
            is_raining: r.is_raining,
            recorded_at: Some(r.recorded_at),
        }
    }
}
