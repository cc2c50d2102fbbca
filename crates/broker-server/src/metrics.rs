//! Prometheus exporter bring-up.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the global metrics recorder and starts the exporter's HTTP
/// listener on `bind_addr`. A no-op if called more than once in a process.
pub fn install(bind_addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(bind_addr)
        .install()
        .map_err(|err| anyhow::anyhow!("failed to install prometheus exporter: {err}"))?;
    tracing::info!(%bind_addr, "prometheus exporter listening");
    Ok(())
}
