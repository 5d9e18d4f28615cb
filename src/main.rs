// =============================================================================
// Saya Viewer — Main Entry Point
// =============================================================================
//
// Serves a single-page dashboard comparing two index constituents by the
// ratio of their daily closes (さや比) and its rolling average.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod directory;
mod error;
mod indicators;
mod market_data;
mod presenter;
mod runtime_config;
mod spread;
mod types;

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RuntimeConfig;

const DEFAULT_CONFIG_PATH: &str = "saya_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Saya Viewer starting up");

    let config_path =
        std::env::var("SAYA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());

    info!(
        directory_url = %config.directory_url,
        price_base_url = %config.price_base_url,
        default_lookback = %config.default_lookback,
        default_window = config.default_window,
        directory_ttl_secs = config.directory_ttl_secs,
        "Configuration resolved"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::from_config(config)?);

    // ── 3. Warm the directory cache (non-fatal) ──────────────────────────
    match state.directory.resolve().await {
        Ok(directory) => info!(count = directory.len(), "Instrument directory warmed"),
        Err(e) => warn!(error = %e, "Directory warm-up failed; will retry on first request"),
    }

    // ── 4. Serve until Ctrl+C ────────────────────────────────────────────
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await?;

    info!("Saya Viewer shut down complete.");
    Ok(())
}
