//! Keygate license server.
//!
//! Owns the authoritative license record for one installation and exposes:
//! 1. A guest-safe health read and boot snapshot for session watchdogs
//! 2. Operator-triggered activate/validate/deactivate operations
//!
//! Usage:
//!   keygate-server --port 8080 --config keygate.json
//!
//! A periodic background task revalidates the license against the remote
//! authority so grace handling engages without operator action.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use keygate_authority::{AuthorityConfig, HttpAuthorityClient};
use keygate_core::{EngineConfig, LicenseEngine, RecordStore, SystemClock};
use keygate_server::{build_router, AppState, ServerConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "keygate-server")]
#[command(about = "Keygate license enforcement server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "keygate.json")]
    config: PathBuf,

    /// Directory for the license record (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Keygate server starting...");
    let config = if args.config.exists() {
        ServerConfig::load(&args.config)?
    } else {
        info!("no config file at {}; reading authority settings from environment", args.config.display());
        ServerConfig {
            authority: AuthorityConfig::from_env()?,
            ..ServerConfig::default()
        }
    };

    let authority = Arc::new(HttpAuthorityClient::new(config.authority.clone())?);

    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(RecordStore::default_data_dir);
    let store = RecordStore::open(&data_dir)?;
    info!("license record at {}", store.path().display());

    let mut engine_config = EngineConfig::default();
    if let Some(hours) = config.grace_hours {
        engine_config.grace_period = Duration::hours(hours);
    }
    let engine = Arc::new(LicenseEngine::new(
        authority,
        store,
        Arc::new(SystemClock),
        engine_config,
    )?);

    spawn_auto_validate(engine.clone(), config.revalidate_hours);

    let app = build_router(AppState {
        engine: engine.clone(),
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .context("failed to bind HTTP port")?;

    let status = engine.health().await;
    println!("\n========================================");
    println!("  Keygate Server Running");
    println!("========================================");
    println!("  Port:      {}", args.port);
    println!("  Status:    {}", status.status);
    println!("  Authority: {}", config.authority.base_url);
    println!("  Record:    {}", data_dir.display());
    println!("========================================\n");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

/// Revalidates the license on a fixed cadence. Serialized with operator
/// calls by the engine's write gate; skipped while no key is configured.
fn spawn_auto_validate(engine: Arc<LicenseEngine>, every_hours: u64) {
    let period = std::time::Duration::from_secs(every_hours.max(1) * 3600);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if !engine.record().await.is_configured() {
                warn!("auto-validate skipped: no license key configured");
                continue;
            }
            match engine.validate(None).await {
                Ok(report) => info!(status = %report.status, "auto-validate ok"),
                Err(e) if e.is_transient() => warn!("auto-validate deferred: {e}"),
                Err(e) => warn!("auto-validate failed: {e}"),
            }
        }
    });
}
