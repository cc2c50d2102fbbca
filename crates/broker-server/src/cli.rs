//! Command-line surface. Every flag doubles as an environment variable so
//! it can be set equally well in a container.

use std::net::SocketAddr;
use std::path::PathBuf;

use broker_core::BrokerSettings;
use clap::Parser;

/// The work broker HTTP server.
#[derive(Debug, Parser)]
#[command(name = "broker-server", version, about = "Distributed work broker")]
pub struct Cli {
    /// Address the HTTP API binds to.
    #[arg(long, env = "BROKER_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Address the Prometheus exporter binds to. Unset disables it.
    #[arg(long, env = "BROKER_METRICS_BIND_ADDR")]
    pub metrics_bind_addr: Option<SocketAddr>,

    /// Never call the launcher; assume workers show up on their own.
    #[arg(long, env = "BROKER_WORK_OFFLINE")]
    pub work_offline: bool,

    /// Ceiling on the number of distinct workers the catalog tracks.
    #[arg(long, env = "BROKER_MAX_WORKERS", default_value_t = BrokerSettings::DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// Minimum time between provisioning requests for the same category.
    #[arg(
        long,
        env = "BROKER_WORKER_STARTUP_WINDOW_MS",
        default_value_t = BrokerSettings::DEFAULT_WORKER_STARTUP_WINDOW_MILLIS
    )]
    pub worker_startup_window_ms: i64,

    /// A worker is dropped once this long has passed since its last poll.
    #[arg(long, env = "BROKER_WORKER_TTL_MS", default_value_t = BrokerSettings::DEFAULT_WORKER_TTL_MILLIS)]
    pub worker_ttl_ms: i64,

    /// Maximum tasks handed out per poll.
    #[arg(
        long,
        env = "BROKER_MAX_TASKS_PER_POLL",
        default_value_t = BrokerSettings::DEFAULT_MAX_TASKS_PER_POLL
    )]
    pub max_tasks_per_poll: u32,

    /// Maximum number of redelivery sweeps a job can undergo.
    #[arg(
        long,
        env = "BROKER_MAX_REDELIVERY_PASSES",
        default_value_t = BrokerSettings::DEFAULT_MAX_REDELIVERY_PASSES
    )]
    pub max_redelivery_passes: u32,

    /// Minimum idle time before a job is eligible for another redelivery
    /// sweep.
    #[arg(
        long,
        env = "BROKER_REDELIVERY_QUIET_PERIOD_MS",
        default_value_t = BrokerSettings::DEFAULT_REDELIVERY_QUIET_PERIOD_MILLIS
    )]
    pub redelivery_quiet_period_ms: i64,

    /// Optional TOML file. Any field it sets overrides the flag or
    /// environment-variable value above.
    #[arg(long, env = "BROKER_CONFIG")]
    pub config: Option<PathBuf>,
}
