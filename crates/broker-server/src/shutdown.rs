//! Graceful shutdown trigger for `axum::serve(...).with_graceful_shutdown(...)`,
//! resolving on ctrl-c or, on unix, `SIGTERM` from a container orchestrator.

use tokio::signal;

/// Resolves on `SIGINT` (ctrl-c) or, on unix, `SIGTERM`. Pass the returned
/// future to `axum::serve(...).with_graceful_shutdown(...)`.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
