//! The broker's one outbound port: asking something else to start more
//! workers. Modeled as a trait so the dispatch policy never depends on how
//! provisioning is actually done.

use async_trait::async_trait;

use crate::category::WorkerCategory;

/// Requests additional worker capacity for a category. Implementations are
/// expected to be fire-and-forget from the broker's point of view: the
/// broker never blocks dispatch on this call completing.
#[async_trait]
pub trait LauncherPort: Send + Sync {
    /// Asks for `desired_count` more workers able to serve `category`.
    async fn ensure_capacity(&self, category: &WorkerCategory, desired_count: u32) -> anyhow::Result<()>;
}

/// A launcher for offline/local runs: logs the request and always succeeds.
#[derive(Debug, Default)]
pub struct NoopLauncher;

#[async_trait]
impl LauncherPort for NoopLauncher {
    async fn ensure_capacity(&self, category: &WorkerCategory, desired_count: u32) -> anyhow::Result<()> {
        tracing::debug!(
            graph_id = %category.graph_id,
            version = %category.version,
            desired_count,
            "offline mode: skipping worker capacity request"
        );
        Ok(())
    }
}

/// A launcher that only logs. Useful as a placeholder ahead of a real
/// fleet-management integration.
#[derive(Debug, Default)]
pub struct LoggingLauncher;

#[async_trait]
impl LauncherPort for LoggingLauncher {
    async fn ensure_capacity(&self, category: &WorkerCategory, desired_count: u32) -> anyhow::Result<()> {
        tracing::info!(
            graph_id = %category.graph_id,
            version = %category.version,
            desired_count,
            "requesting worker capacity"
        );
        Ok(())
    }
}
