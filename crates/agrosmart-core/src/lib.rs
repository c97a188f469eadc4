//! `AgroSmart` Core Library
//!
//! Shared functionality for `AgroSmart` components:
//! - Irrigation decision rules
//! - Zone and reading data model
//! - Zone store abstraction with in-memory and `SQLite` backends
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod db;
pub mod decision;
pub mod error;
pub mod irrigation;
pub mod reading;
pub mod store;
pub mod tracing_init;
pub mod zone;

pub use config::Config;
pub use decision::{DecisionMode, PumpDecision, Rule};
pub use error::{Error, Result};
pub use irrigation::Irrigator;
pub use reading::{LatestReading, Reading, SensorReport};
pub use zone::{Zone, ZoneId, ZoneOverview, ZoneSettings};
