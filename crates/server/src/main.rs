mod api;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use axum::Router;
use pairadox_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use pairadox_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let router = build_router(&app);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        catalog_products = app.engine.product_count(),
        "pairadox-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "pairadox-server stopping"
    );

    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(drain, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            timeout_secs = app.config.server.graceful_shutdown_secs,
            "database pool did not close in time"
        );
    }

    Ok(())
}

fn build_router(app: &bootstrap::Application) -> Router {
    let api_state = api::ApiState::new(app.engine.clone(), app.catalog_repository.clone());
    let health_state = health::HealthState::new(app.db_pool.clone(), app.engine.clone());

    api::router(api_state, app.config.catalog.max_upload_bytes)
        .merge(health::router(health_state))
        .layer(api::cors_layer(&app.config.server))
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
