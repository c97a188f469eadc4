//! Irrigation decision rules.
//!
//! The automatic decision is an ordered rule list evaluated top to bottom;
//! the first rule that fires wins. All comparisons are strict, so a reading
//! sitting exactly on a threshold falls through to the next rule.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::reading::SensorReport;

/// Soil moisture (%) above which the soil is considered wet enough.
pub const WET_SOIL_ABOVE: f64 = 60.0;
/// Soil moisture (%) below which the soil is dry.
pub const DRY_SOIL_BELOW: f64 = 30.0;
/// Temperature (°C) below which watering dry soil is allowed.
pub const COOL_TEMPERATURE_BELOW: f64 = 40.0;
/// Soil moisture (%) below which the soil is watered regardless of heat.
pub const VERY_DRY_SOIL_BELOW: f64 = 20.0;

/// How the automatic decision combines with a pending manual request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Only the automatic rules drive the pump.
    AutoOnly,
    /// The pump also runs when a manual request is pending.
    #[default]
    AutoOrManual,
}

impl fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoOnly => write!(f, "auto_only"),
            Self::AutoOrManual => write!(f, "auto_or_manual"),
        }
    }
}

impl FromStr for DecisionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto_only" | "auto" => Ok(Self::AutoOnly),
            "auto_or_manual" => Ok(Self::AutoOrManual),
            other => Err(format!(
                "unknown decision mode '{other}' (expected auto_only or auto_or_manual)"
            )),
        }
    }
}

/// The automatic rule that decided a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// It is raining.
    Raining,
    /// Soil moisture above [`WET_SOIL_ABOVE`].
    SoilWet,
    /// Soil moisture below [`DRY_SOIL_BELOW`] and temperature below
    /// [`COOL_TEMPERATURE_BELOW`].
    DryAndCool,
    /// Soil moisture below [`VERY_DRY_SOIL_BELOW`].
    VeryDry,
    /// Nothing fired.
    NoRuleMatched,
}

impl Rule {
    /// Whether this rule turns the pump on.
    pub const fn waters(self) -> bool {
        matches!(self, Self::DryAndCool | Self::VeryDry)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raining => write!(f, "raining"),
            Self::SoilWet => write!(f, "soil_wet"),
            Self::DryAndCool => write!(f, "dry_and_cool"),
            Self::VeryDry => write!(f, "very_dry"),
            Self::NoRuleMatched => write!(f, "no_rule_matched"),
        }
    }
}

/// Outcome of a decision for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PumpDecision {
    /// Final pump command.
    pub pump_on: bool,
    /// Automatic rule that fired.
    pub rule: Rule,
    /// A manual request was pending and is consumed by this decision.
    pub manual_consumed: bool,
}

impl PumpDecision {
    /// The pump runs only because of a manual request.
    pub const fn manual_override(&self) -> bool {
        self.pump_on && !self.rule.waters()
    }
}

/// Evaluate the automatic rules against a report.
pub fn evaluate(report: &SensorReport) -> Rule {
    if report.is_raining {
        Rule::Raining
    } else if report.soil_moisture > WET_SOIL_ABOVE {
        Rule::SoilWet
    } else if report.soil_moisture < DRY_SOIL_BELOW && report.temperature < COOL_TEMPERATURE_BELOW
    {
        Rule::DryAndCool
    } else if report.soil_moisture < VERY_DRY_SOIL_BELOW {
        Rule::VeryDry
    } else {
        Rule::NoRuleMatched
    }
}

/// Decide the pump command for a report given the zone's manual flag.
///
/// The manual flag is always reported as consumed when it was set, whatever
/// the mode and the outcome.
pub fn decide(report: &SensorReport, manual_pending: bool, mode: DecisionMode) -> PumpDecision {
    let rule = evaluate(report);
    let pump_on = match mode {
        DecisionMode::AutoOnly => rule.waters(),
        DecisionMode::AutoOrManual => rule.waters() || manual_pending,
    };
    PumpDecision {
        pump_on,
        rule,
        manual_consumed: manual_pending,
    }
}
