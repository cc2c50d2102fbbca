//! Merges CLI flags (and their environment-variable equivalents) with an
//! optional TOML override file layered on top.

use std::net::SocketAddr;
use std::path::Path;

use broker_core::BrokerSettings;
use serde::Deserialize;

use crate::cli::Cli;

/// Fully resolved broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address the HTTP API binds to.
    pub bind_addr: SocketAddr,
    /// Address the Prometheus exporter binds to, if enabled.
    pub metrics_bind_addr: Option<SocketAddr>,
    /// Dispatch policy settings passed straight through to the broker actor.
    pub settings: BrokerSettings,
}

/// Every field optional: only fields present in the file override the
/// CLI-derived config.
#[derive(Debug, Default, Deserialize)]
struct BrokerConfigFile {
    bind_addr: Option<SocketAddr>,
    metrics_bind_addr: Option<SocketAddr>,
    work_offline: Option<bool>,
    max_workers: Option<usize>,
    worker_startup_window_ms: Option<i64>,
    worker_ttl_ms: Option<i64>,
    max_tasks_per_poll: Option<u32>,
    max_redelivery_passes: Option<u32>,
    redelivery_quiet_period_ms: Option<i64>,
}

impl BrokerConfig {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            bind_addr: cli.bind_addr,
            metrics_bind_addr: cli.metrics_bind_addr,
            settings: BrokerSettings {
                work_offline: cli.work_offline,
                max_workers: cli.max_workers,
                worker_startup_window_millis: cli.worker_startup_window_ms,
                worker_ttl_millis: cli.worker_ttl_ms,
                max_tasks_per_poll: cli.max_tasks_per_poll,
                max_redelivery_passes: cli.max_redelivery_passes,
                redelivery_quiet_period_millis: cli.redelivery_quiet_period_ms,
            },
        }
    }

    fn apply_file(&mut self, file: BrokerConfigFile) {
        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
        if let Some(v) = file.metrics_bind_addr {
            self.metrics_bind_addr = Some(v);
        }
        if let Some(v) = file.work_offline {
            self.settings.work_offline = v;
        }
        if let Some(v) = file.max_workers {
            self.settings.max_workers = v;
        }
        if let Some(v) = file.worker_startup_window_ms {
            self.settings.worker_startup_window_millis = v;
        }
        if let Some(v) = file.worker_ttl_ms {
            self.settings.worker_ttl_millis = v;
        }
        if let Some(v) = file.max_tasks_per_poll {
            self.settings.max_tasks_per_poll = v;
        }
        if let Some(v) = file.max_redelivery_passes {
            self.settings.max_redelivery_passes = v;
        }
        if let Some(v) = file.redelivery_quiet_period_ms {
            self.settings.redelivery_quiet_period_millis = v;
        }
    }
}

/// Builds the final config from CLI flags, then applies `cli.config` on
/// top if one was given.
pub fn load_broker_config(cli: &Cli) -> anyhow::Result<BrokerConfig> {
    let mut config = BrokerConfig::from_cli(cli);
    if let Some(path) = &cli.config {
        let file = read_config_file(path)?;
        config.apply_file(file);
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> anyhow::Result<BrokerConfigFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("failed to read config file {}: {err}", path.display()))?;
    toml::from_str(&text)
        .map_err(|err| anyhow::anyhow!("failed to parse config file {}: {err}", path.display()))
}
