mod bootstrap;
mod control;
mod error;
mod health;
mod sessions;
mod storefront;

use anyhow::Result;
use axum::Router;
use pwyc_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use pwyc_core::config::LogFormat::*;
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
    // Logging comes up before bootstrap so bootstrap events are visible
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let state = app.state;

    let router = Router::new()
        .merge(storefront::router(state.clone()))
        .merge(control::router(state.clone()))
        .merge(health::router(state.store.clone(), state.registry.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "pwyc-server listening"
    );
    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "pwyc-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for shutdown signal"
        );
    }
}
