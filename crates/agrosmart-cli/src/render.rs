//! Plain-text output for zones and pump commands.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use agrosmart_core::{ZoneId, ZoneOverview};

use crate::client::PumpCommand;

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || "never".to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// One row per zone.
pub fn write_zone_table(w: &mut impl Write, zones: &[(ZoneId, ZoneOverview)]) -> io::Result<()> {
    if zones.is_empty() {
        return writeln!(w, "No zones configured.");
    }
    writeln!(
        w,
        "{:<8} {:<16} {:>8} {:>8} {:>7} {:>5} {:<19} {:<24}",
        "ZONE", "CROP", "MOIST%", "TEMP°C", "HUM%", "RAIN", "STATUS", "UPDATED"
    )?;
    for (id, zone) in zones {
        writeln!(
            w,
            "{:<8} {:<16} {:>8.1} {:>8.1} {:>7.1} {:>5} {:<19} {:<24}",
            id.label(),
            truncate(&zone.crop, 16),
            zone.soil_moisture,
            zone.temperature,
            zone.humidity,
            yes_no(zone.is_raining),
            zone.status.to_string(),
            format_timestamp(zone.last_updated),
        )?;
    }
    Ok(())
}

pub fn write_zone_detail(w: &mut impl Write, id: ZoneId, zone: &ZoneOverview) -> io::Result<()> {
    writeln!(w, "  Zone:     {}", id.label())?;
    writeln!(w, "  Crop:     {}", zone.crop)?;
    writeln!(
        w,
        "  Moisture: {:.1}% (target {:.1}%)",
        zone.soil_moisture, zone.target_moisture
    )?;
    writeln!(w, "  Temp:     {:.1} °C", zone.temperature)?;
    writeln!(w, "  Humidity: {:.1}%", zone.humidity)?;
    writeln!(w, "  Raining:  {}", yes_no(zone.is_raining))?;
    writeln!(w, "  Status:   {}", zone.status)?;
    if zone.manual_water_level > 0 {
        writeln!(w, "  Manual:   {} L", zone.manual_water_level)?;
    }
    writeln!(w, "  Updated:  {}", format_timestamp(zone.last_updated))?;
    Ok(())
}

pub fn write_pump_command(w: &mut impl Write, command: &PumpCommand) -> io::Result<()> {
    writeln!(w, "{}", command.message)?;
    writeln!(w, "Pump: {}", if command.pump_on { "ON" } else { "OFF" })
}
