mod bootstrap;
mod devis;
mod health;
mod turn;

use std::time::Duration;

use anyhow::Result;
use chantier_core::config::{AppConfig, LoadOptions};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use chantier_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging depends on the loaded config, so load it first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "chantier-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let router = app.router().layer(TraceLayer::new_for_http());
    let server = async move {
        axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await
    };

    // In-flight turns get a bounded grace period once the signal arrives.
    tokio::select! {
        result = server => result?,
        _ = async {
            wait_for_shutdown().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                event_name = "system.server.grace_elapsed",
                grace_secs = grace.as_secs(),
                "graceful shutdown window elapsed, dropping remaining connections"
            );
        }
    }

    tracing::info!(event_name = "system.server.stopped", "chantier-server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    tracing::info!(event_name = "system.server.stopping", "shutdown signal received");
}
