//! FitCoach - Fitness Coaching Backend
//!
//! Main entry point for the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fitcoach::auth::LogMailer;
use fitcoach::storage::config::load_config;
use fitcoach::{build_router, AppState, AsaasGateway, Database};

/// How often idle realtime channels are dropped.
const REALTIME_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FitCoach v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("failed to load configuration")?;
    if config.auth.session_secret == "change-me" {
        tracing::warn!("Using the default session secret; set FITCOACH_SESSION_SECRET");
    }
    if config.assistant.api_key.is_none() {
        tracing::warn!("No LLM API key configured; assistants will answer with fallbacks");
    }

    let db = Database::open(&config.database_path())
        .with_context(|| format!("failed to open database at {}", config.database_path().display()))?;
    let gateway = AsaasGateway::from_settings(&config.billing).context("failed to build payment client")?;
    let bind_addr = config.server.bind_addr.clone();

    let state = AppState::new(config, db, Arc::new(gateway), Arc::new(LogMailer))
        .context("failed to build application state")?;

    let hub = state.hub.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REALTIME_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            let pruned = hub.prune_idle();
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned idle realtime channels");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, build_router(state))
        .await
        .context("server error")?;
    Ok(())
}
