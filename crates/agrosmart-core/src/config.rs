//! Configuration resolution for `AgroSmart`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Config file (explicit path, else `<config dir>/agrosmart/settings.json` if present)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the binaries)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decision::DecisionMode;
use crate::error::{Error, Result};
use crate::zone::{DEFAULT_TARGET_MOISTURE, Zone, ZoneId};

/// Complete `AgroSmart` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub irrigation: IrrigationConfig,
    /// One entry per zone; zone ids are assigned `1..=N` in order.
    #[serde(default = "default_zones")]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Route `POST /reset`.
    pub allow_reset: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: Vec::new(),
            allow_reset: false,
        }
    }
}

/// Decision engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    pub decision_mode: DecisionMode,
    /// Target moisture for zones that do not set their own.
    pub default_target_moisture: f64,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            decision_mode: DecisionMode::default(),
            default_target_moisture: DEFAULT_TARGET_MOISTURE,
        }
    }
}

/// Initial settings of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub crop: String,
    #[serde(default)]
    pub target_moisture: Option<f64>,
}

impl ZoneConfig {
    fn crop(crop: &str) -> Self {
        Self {
            crop: crop.to_string(),
            target_moisture: None,
        }
    }
}

fn default_zones() -> Vec<ZoneConfig> {
    ["Ginger", "Large Cardamom", "Mandarin Orange", "Ginger"]
        .into_iter()
        .map(ZoneConfig::crop)
        .collect()
}

/// Where zone state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend '{other}' (expected memory or sqlite)")),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// `SQLite` file; defaults to [`database_path`].
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured path, falling back to the platform data directory.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(database_path)
    }
}

impl Config {
    /// Zones to create at startup.
    pub fn zone_seeds(&self) -> Vec<Zone> {
        self.zones
            .iter()
            .zip(1..)
            .map(|(zone, id)| {
                Zone::new(
                    ZoneId(id),
                    zone.crop.trim(),
                    zone.target_moisture
                        .unwrap_or(self.irrigation.default_target_moisture),
                )
            })
            .collect()
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.zones.is_empty() {
            return Err(Error::Config("at least one zone must be configured".into()));
        }
        check_target("irrigation.default_target_moisture", self.irrigation.default_target_moisture)?;
        for (index, zone) in self.zones.iter().enumerate() {
            if zone.crop.trim().is_empty() {
                return Err(Error::Config(format!("zones[{index}].crop must not be empty")));
            }
            if let Some(target) = zone.target_moisture {
                check_target(&format!("zones[{index}].target_moisture"), target)?;
            }
        }
        if self.storage.backend == StorageBackend::Sqlite
            && self.storage.resolved_database_path().is_none()
        {
            return Err(Error::Config(
                "sqlite storage needs storage.database_path (no data directory found)".into(),
            ));
        }
        Ok(())
    }
}

fn check_target(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be between 0 and 100, got {value}")))
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the global settings file is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(global) if global.exists() => load_config_file(&global)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agrosmart").join("settings.json"))
}

/// Default `SQLite` database path.
pub fn database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("agrosmart").join("agrosmart.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `AGROSMART_*` overrides; `lookup` reads one variable.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("AGROSMART_ADDR") {
        config.server.listen_addr = val
            .parse()
            .map_err(|e| Error::Config(format!("AGROSMART_ADDR: {e}")))?;
    }
    if let Some(val) = lookup("AGROSMART_DECISION_MODE") {
        config.irrigation.decision_mode = val
            .parse()
            .map_err(|e| Error::Config(format!("AGROSMART_DECISION_MODE: {e}")))?;
    }
    if let Some(val) = lookup("AGROSMART_STORAGE") {
        config.storage.backend = val
            .parse()
            .map_err(|e| Error::Config(format!("AGROSMART_STORAGE: {e}")))?;
    }
    if let Some(val) = lookup("AGROSMART_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("AGROSMART_ALLOW_RESET") {
        config.server.allow_reset = matches!(val.trim(), "1" | "true" | "TRUE" | "yes");
    }
    Ok(())
}
