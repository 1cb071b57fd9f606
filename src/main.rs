// src/main.rs

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use injury_sentinel::api::{create_router, AppState};
use injury_sentinel::profiles::Sport;
use injury_sentinel::types::Config;
use injury_sentinel::PredictorRegistry;

const DEFAULT_CONFIG: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let found = Path::new(&path).exists();
    let config = if found { Config::load(&path)? } else { Config::default() };

    // RUST_LOG wins over the configured directive
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🏃 Injury Sentinel starting");
    if !found {
        warn!("⚠️  Config file {} not found, using defaults", path);
    }
    info!("✓ Configuration loaded");
    info!(
        "Cadence: secondary every {} frame(s), stream frame_skip={} | alerts: yellow≥{} red≥{} cooldown={}s",
        config.pipeline.secondary_interval,
        config.pipeline.frame_skip,
        config.alerts.yellow_threshold,
        config.alerts.red_threshold,
        config.alerts.cooldown_seconds
    );

    let registry = Arc::new(PredictorRegistry::new(config.predictor.clone()));
    let preload: Vec<Sport> = config
        .server
        .preload_sports
        .iter()
        .map(|s| Sport::parse(s))
        .collect();
    if !preload.is_empty() {
        let r = registry.clone();
        tokio::task::spawn_blocking(move || r.preload(&preload))
            .await
            .context("predictor preload task")??;
    }

    let bind = config.server.bind.clone();
    let app = create_router(AppState::new(config, registry));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!("🚀 Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown requested");
}
