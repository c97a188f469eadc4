//! `AgroSmart` CLI
//!
//! Terminal dashboard: polls zone readings, requests manual watering, changes
//! zone settings and can stand in for a sensor node.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use agrosmart_cli::client::{ClientError, DashboardClient};
use agrosmart_cli::render::{
    format_timestamp, write_pump_command, write_zone_detail, write_zone_table,
};
use agrosmart_core::tracing_init::init_tracing;
use agrosmart_core::{SensorReport, ZoneId, ZoneSettings};

#[derive(Parser, Debug)]
#[command(name = "agrosmart")]
#[command(version, about = "AgroSmart irrigation dashboard", long_about = None)]
struct Cli {
    /// AgroSmart server URL.
    #[arg(long, global = true, env = "AGROSMART_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the latest readings of every zone.
    Zones {
        /// Refresh every N seconds until Ctrl-C.
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Show one zone.
    Zone {
        /// Zone id, e.g. `3` or "Zone 3".
        zone: ZoneId,
    },
    /// Request manual watering on the zone's next sensor sync.
    Water {
        zone: ZoneId,
        /// Litres to record with the request.
        #[arg(long)]
        amount: Option<u32>,
    },
    /// Change a zone's crop or target moisture.
    Configure {
        zone: ZoneId,
        #[arg(long)]
        crop: Option<String>,
        /// Target soil moisture in %.
        #[arg(long)]
        target: Option<f64>,
    },
    /// Send a reading as a sensor node would and print the pump command.
    Report {
        zone: ZoneId,
        #[arg(long)]
        temperature: f64,
        #[arg(long)]
        humidity: f64,
        #[arg(long)]
        soil_moisture: f64,
        #[arg(long)]
        raining: bool,
    },
    /// Check that the server is up.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing("agrosmart_cli=warn", false);

    let client = DashboardClient::new(&cli.server, Duration::from_secs(cli.timeout))?;
    info!(server = %client.base_url(), "Starting agrosmart CLI");

    match run(&client, cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<ClientError>() {
            Some(client_err) if client_err.is_retryable() => {
                writeln!(io::stderr(), "{client_err}. Is the server running? Try again shortly.")?;
                Ok(ExitCode::from(2))
            }
            Some(ClientError::Api { detail, .. }) => {
                writeln!(io::stderr(), "Error: {detail}")?;
                Ok(ExitCode::FAILURE)
            }
            _ => Err(e),
        },
    }
}

async fn run(client: &DashboardClient, command: Command) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match command {
        Command::Zones { watch: None } => {
            let zones = client.zones().await?;
            write_zone_table(&mut out, &zones)?;
        }
        Command::Zones { watch: Some(secs) } => watch_zones(client, secs.max(1)).await?,
        Command::Zone { zone } => {
            let overview = client.zone(zone).await?;
            write_zone_detail(&mut out, zone, &overview)?;
        }
        Command::Water { zone, amount } => {
            let message = client.water(zone, amount).await?;
            writeln!(out, "{message}")?;
        }
        Command::Configure { zone, crop, target } => {
            if crop.is_none() && target.is_none() {
                anyhow::bail!("nothing to change: pass --crop and/or --target");
            }
            let settings = ZoneSettings {
                crop,
                target_moisture: target,
            };
            let overview = client.configure(zone, &settings).await?;
            write_zone_detail(&mut out, zone, &overview)?;
        }
        Command::Report {
            zone,
            temperature,
            humidity,
            soil_moisture,
            raining,
        } => {
            let report = SensorReport {
                temperature,
                humidity,
                soil_moisture,
                is_raining: raining,
            };
            let command = client.report(zone, &report).await?;
            write_pump_command(&mut out, &command)?;
        }
        Command::Health => {
            let health = client.health().await?;
            writeln!(
                out,
                "{}: {} (server time {})",
                client.base_url(),
                health.status,
                format_timestamp(Some(health.timestamp))
            )?;
        }
    }
    Ok(())
}

/// Poll `/zones` until Ctrl-C. An unreachable server is reported and the
/// next tick tries again.
async fn watch_zones(client: &DashboardClient, secs: u64) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        match client.zones().await {
            Ok(zones) => {
                writeln!(out, "\n{}", format_timestamp(Some(chrono::Utc::now())))?;
                write_zone_table(&mut out, &zones)?;
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Zone poll failed");
                writeln!(io::stderr(), "{e}. Retrying in {secs}s...")?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
