//! Broker server entry point: parse CLI/config, stand up logging and
//! metrics, spawn the broker actor, and serve the HTTP surface until a
//! shutdown signal arrives.

use std::sync::Arc;

use broker_core::{BrokerHandle, LoggingLauncher, NoopLauncher};
use broker_server::config::load_broker_config;
use broker_server::{cli, http, metrics, shutdown};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    let config = load_broker_config(&cli)?;

    if let Some(metrics_addr) = config.metrics_bind_addr {
        metrics::install(metrics_addr)?;
    }

    let launcher: Arc<dyn broker_core::LauncherPort> = if config.settings.work_offline {
        Arc::new(NoopLauncher)
    } else {
        Arc::new(LoggingLauncher)
    };
    let broker = BrokerHandle::spawn(config.settings, launcher);

    let app = http::router(http::AppState { broker });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(bind_addr = %config.bind_addr, "broker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_shutdown_signal())
        .await?;

    tracing::info!("broker shut down cleanly");
    Ok(())
}
