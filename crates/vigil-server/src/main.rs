use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use vigil_notify::channels::websocket::SessionHub;
use vigil_server::app;
use vigil_server::config::{AlertsSeedFile, ServerConfig, StorageBackend};
use vigil_server::retention;
use vigil_server::scheduler::{AlertScheduler, SchedulerSettings};
use vigil_server::seed;
use vigil_server::state::{AppState, Store};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vigil-server [config.toml]                          Start the server (default config/server.toml)");
    eprintln!("  vigil-server seed-alerts <config.toml> <seed.json>  Insert alerts and users from a seed file");
    eprintln!("  vigil-server --help                                 Show this message");
}

#[tokio::main]
async fn main() -> Result<()> {
    vigil_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("seed-alerts") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("seed-alerts requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("seed-alerts requires <seed.json> argument")
            })?;
            run_seed_alerts(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

async fn run_seed_alerts(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    if config.storage.backend == StorageBackend::Memory {
        anyhow::bail!("seed-alerts needs a persistent backend, but storage.backend is \"memory\"");
    }
    let store = Store::open(&config.storage)?;

    let content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed_file = AlertsSeedFile::parse(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let summary = seed::apply_seed(&store, &seed_file).await?;
    tracing::info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        users = summary.users,
        "Seeding finished"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    tracing::info!(config = %config_path, "Configuration loaded");

    let store = Store::open(&config.storage)?;
    let hub = Arc::new(SessionHub::new());
    let dispatcher = Arc::new(app::build_dispatcher(&config, store.users(), hub.clone())?);

    let scheduler_handle = if config.engine.enabled {
        let scheduler = Arc::new(AlertScheduler::new(
            store.alerts(),
            store.metrics(),
            dispatcher,
            SchedulerSettings {
                poll_interval: Duration::from_secs(config.engine.poll_interval_secs),
                tiers: config.severity,
            },
        )?);
        Some(scheduler.start())
    } else {
        tracing::info!("Alert engine disabled by configuration");
        None
    };

    let purge_handle = retention::spawn_purge_task(store.metrics(), config.storage.retention_days);

    let state = AppState {
        metrics: store.metrics(),
        hub,
        engine_enabled: config.engine.enabled,
        start_time: Utc::now(),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let result = axum::serve(http_listener, app::build_http_app(state))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "HTTP server error");
    }

    purge_handle.abort();
    if let Some(handle) = scheduler_handle {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");

    result.map_err(Into::into)
}
