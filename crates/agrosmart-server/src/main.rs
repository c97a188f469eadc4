//! `AgroSmart` server
//!
//! Receives sensor reports, answers with pump decisions and serves the
//! dashboard endpoints.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use agrosmart_core::config::{self, Config, StorageBackend};
use agrosmart_core::store::{MemoryStore, SqliteStore, ZoneStore};
use agrosmart_core::tracing_init::init_tracing;
use agrosmart_core::{DecisionMode, Irrigator};
use agrosmart_server::routes::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "agrosmart-server")]
#[command(version, about = "AgroSmart irrigation server")]
struct Args {
    /// Path to a JSON settings file.
    #[arg(long, env = "AGROSMART_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Zone store backend (memory or sqlite).
    #[arg(long)]
    storage: Option<StorageBackend>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Decision mode (auto_only or auto_or_manual).
    #[arg(long)]
    decision_mode: Option<DecisionMode>,

    /// Expose `POST /reset`.
    #[arg(long)]
    allow_reset: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(addr) = self.addr {
            config.server.listen_addr = addr;
        }
        if let Some(backend) = self.storage {
            config.storage.backend = backend;
        }
        if let Some(path) = &self.db_path {
            config.storage.backend = StorageBackend::Sqlite;
            config.storage.database_path = Some(path.clone());
        }
        if let Some(mode) = self.decision_mode {
            config.irrigation.decision_mode = mode;
        }
        if self.allow_reset {
            config.server.allow_reset = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("agrosmart_server=info,agrosmart_core=info,tower_http=info", args.log_json);

    let mut config = config::load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.listen_addr,
        decision_mode = %config.irrigation.decision_mode,
        zones = config.zones.len(),
        "Starting agrosmart-server"
    );

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory zone store");
            serve(MemoryStore::new(), &config).await
        }
        StorageBackend::Sqlite => {
            let path = config
                .storage
                .resolved_database_path()
                .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
            info!(path = %path.display(), "Opening zone database");
            serve(SqliteStore::open(&path).await?, &config).await
        }
    }
}

async fn serve<S>(store: S, config: &Config) -> anyhow::Result<()>
where
    S: ZoneStore + Clone + 'static,
{
    let irrigator = Irrigator::new(store, config.irrigation.decision_mode, config.zone_seeds());
    irrigator.ensure_zones().await?;

    let app = build_router(AppState { irrigator }, &config.server);
    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Server stopped");
    Ok(())
}
