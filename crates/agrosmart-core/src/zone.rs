//! Irrigation zones and the per-zone view served to dashboards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reading::LatestReading;

/// Default target soil moisture (%) for a new zone.
pub const DEFAULT_TARGET_MOISTURE: f64 = 55.0;

/// Zone identifier, `1..=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u32);

impl ZoneId {
    /// Dashboard label, e.g. `"Zone 3"`.
    pub fn label(self) -> String {
        format!("Zone {}", self.0)
    }

    /// Zero-based arena slot, `None` for the invalid id 0.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()?.checked_sub(1)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts `"3"` as well as the dashboard label `"Zone 3"`.
impl FromStr for ZoneId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("Zone")
            .or_else(|| trimmed.strip_prefix("zone"))
            .map_or(trimmed, str::trim_start);
        match digits.parse::<u32>() {
            Ok(0) | Err(_) => Err(Error::Validation(format!("invalid zone id '{s}'"))),
            Ok(n) => Ok(Self(n)),
        }
    }
}

/// Mutable per-zone state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub crop: String,
    /// Target soil moisture in %. Display only; never drives the pump.
    pub target_moisture: f64,
    /// An unconsumed manual watering request.
    pub manual_pending: bool,
    /// Litres asked for by the last manual request.
    pub manual_water_level: u32,
}

impl Zone {
    pub fn new(id: ZoneId, crop: impl Into<String>, target_moisture: f64) -> Self {
        Self {
            id,
            crop: crop.into(),
            target_moisture,
            manual_pending: false,
            manual_water_level: 0,
        }
    }

    /// Apply validated settings in place.
    pub fn apply(&mut self, settings: &ZoneSettings) {
        if let Some(crop) = &settings.crop {
            self.crop = crop.trim().to_string();
        }
        if let Some(target) = settings.target_moisture {
            self.target_moisture = target;
        }
    }
}

/// A configuration request for a zone. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSettings {
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub target_moisture: Option<f64>,
}

impl ZoneSettings {
    pub fn validate(&self) -> Result<()> {
        if let Some(crop) = &self.crop {
            if crop.trim().is_empty() {
                return Err(Error::Validation("crop must not be empty".into()));
            }
        }
        if let Some(target) = self.target_moisture {
            if !target.is_finite() || !(0.0..=100.0).contains(&target) {
                return Err(Error::Validation(format!(
                    "target_moisture must be between 0 and 100, got {target}"
                )));
            }
        }
        Ok(())
    }
}

/// Status shown on a dashboard zone button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneStatus {
    #[serde(rename = "Optimal")]
    Optimal,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
    #[serde(rename = "Watering Requested")]
    WateringRequested,
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "Optimal"),
            Self::NeedsAttention => write!(f, "Needs Attention"),
            Self::WateringRequested => write!(f, "Watering Requested"),
        }
    }
}

/// One entry of the `GET /zones` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOverview {
    pub crop: String,
    pub target_moisture: f64,
    pub soil_moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub is_raining: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub water_needed: bool,
    pub status: ZoneStatus,
    pub manual_water_level: u32,
}

impl ZoneOverview {
    pub fn new(zone: &Zone, latest: &LatestReading) -> Self {
        let water_needed = zone.manual_pending || latest.soil_moisture < zone.target_moisture;
        let status = if zone.manual_pending {
            ZoneStatus::WateringRequested
        } else if water_needed {
            ZoneStatus::NeedsAttention
        } else {
            ZoneStatus::Optimal
        };
        Self {
            crop: zone.crop.clone(),
            target_moisture: zone.target_moisture,
            soil_moisture: latest.soil_moisture,
            temperature: latest.temperature,
            humidity: latest.humidity,
            is_raining: latest.is_raining,
            last_updated: latest.recorded_at,
            water_needed,
            status,
            manual_water_level: zone.manual_water_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_labelled_ids() {
        assert_eq!("3".parse::<ZoneId>().unwrap(), ZoneId(3));
        assert_eq!("Zone 4".parse::<ZoneId>().unwrap(), ZoneId(4));
        assert_eq!(" zone2 ".parse::<ZoneId>().unwrap(), ZoneId(2));
        assert!("0".parse::<ZoneId>().is_err());
        assert!("abc".parse::<ZoneId>().is_err());
        assert!("-1".parse::<ZoneId>().is_err());
    }

    #[test]
    fn label_and_index() {
        assert_eq!(ZoneId(1).label(), "Zone 1");
        assert_eq!(ZoneId(1).index(), Some(0));
        assert_eq!(ZoneId(0).index(), None);
    }

    #[test]
    fn settings_validation() {
        let ok = ZoneSettings {
            crop: Some("Ginger".into()),
            target_moisture: Some(40.0),
        };
        assert!(ok.validate().is_ok());
        let blank = ZoneSettings {
            crop: Some("  ".into()),
            target_moisture: None,
        };
        assert!(blank.validate().is_err());
        let too_high = ZoneSettings {
            crop: None,
            target_moisture: Some(101.0),
        };
        assert!(too_high.validate().is_err());
    }

    #[test]
    fn apply_trims_crop_and_keeps_missing_fields() {
        let mut zone = Zone::new(ZoneId(1), "Ginger", DEFAULT_TARGET_MOISTURE);
        zone.apply(&ZoneSettings {
            crop: Some("  Turmeric ".into()),
            target_moisture: None,
        });
        assert_eq!(zone.crop, "Turmeric");
        assert_eq!(zone.target_moisture, DEFAULT_TARGET_MOISTURE);
    }

    #[test]
    fn fresh_zone_needs_attention() {
        let zone = Zone::new(ZoneId(1), "Ginger", DEFAULT_TARGET_MOISTURE);
        let overview = ZoneOverview::new(&zone, &LatestReading::default());
        assert!(overview.water_needed);
        assert_eq!(overview.status, ZoneStatus::NeedsAttention);
        assert!(overview.last_updated.is_none());
    }

    #[test]
    fn moist_zone_is_optimal() {
        let zone = Zone::new(ZoneId(1), "Ginger", DEFAULT_TARGET_MOISTURE);
        let latest = LatestReading {
            soil_moisture: 58.0,
            ..LatestReading::default()
        };
        let overview = ZoneOverview::new(&zone, &latest);
        assert!(!overview.water_needed);
        assert_eq!(overview.status, ZoneStatus::Optimal);
    }

    #[test]
    fn pending_request_shows_watering_requested() {
        let mut zone = Zone::new(ZoneId(1), "Ginger", DEFAULT_TARGET_MOISTURE);
        zone.manual_pending = true;
        let latest = LatestReading {
            soil_moisture: 70.0,
            ..LatestReading::default()
        };
        let overview = ZoneOverview::new(&zone, &latest);
        assert!(overview.water_needed);
        assert_eq!(overview.status, ZoneStatus::WateringRequested);
        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["status"], "Watering Requested");
    }
}
