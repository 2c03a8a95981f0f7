//! Goaltracker API Server
//!
//! Run with: cargo run --bin goaltracker
//!
//! # Configuration
//!
//! Read from `~/.config/goaltracker/config.toml` or `./goaltracker.toml`,
//! then overridden by environment variables:
//! - `GOALTRACKER_BACKEND_URL`: Backend project URL (empty: in-memory backend)
//! - `GOALTRACKER_ANON_KEY`: Public API key of the project
//! - `GOALTRACKER_API_HOST` / `GOALTRACKER_API_PORT`: Bind address (default: 127.0.0.1:8085)
//! - `GOALTRACKER_DATA_DIR`: Local state (remembered session, activity log)
//! - `GOALTRACKER_LOG_LEVEL` / `GOALTRACKER_LOG_FORMAT`: Logging (`pretty` or `json`)
//! - `RUST_LOG`: Log filter (default: goaltracker=info,tower_http=debug)

use anyhow::Context;
use goaltracker::api::{serve, ApiConfig, AppState};
use goaltracker::backend::{Backend, MemoryBackend, SupabaseBackend};
use goaltracker::config::{Config, LoggingConfig};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{
    fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    init_tracing(&config.logging)?;

    tracing::info!("Starting Goaltracker API server v{}", env!("CARGO_PKG_VERSION"));

    let backend: Arc<dyn Backend> = if config.backend.is_remote() {
        tracing::info!(url = %config.backend.url, "Using hosted backend");
        Arc::new(
            SupabaseBackend::new(config.backend.supabase())
                .context("Failed to create backend client")?,
        )
    } else {
        tracing::warn!("No backend URL configured, using the in-memory backend (data is lost on exit)");
        Arc::new(MemoryBackend::new())
    };

    match backend.health_check().await {
        Ok(()) => tracing::info!("Backend connection verified"),
        Err(e) => tracing::warn!("Backend not reachable: {} (requests will fail until it is)", e),
    }

    tracing::info!("Data directory: {:?}", config.session.data_path());
    let state = AppState::from_config(backend, &config);

    match state.sessions.restore().await {
        Ok(Some(session)) => {
            tracing::info!(user_id = session.user_id(), "Restored remembered session")
        }
        Ok(None) => tracing::info!("No remembered session, waiting for sign-in"),
        Err(e) => tracing::warn!("Failed to restore session: {}", e),
    }

    let api_config = ApiConfig::from(&config.api);
    serve(state, &api_config).await?;

    tracing::info!("Goaltracker API server stopped");
    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("goaltracker={},tower_http=debug", config.level))
    })?;

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init(),
    }

    Ok(())
}
