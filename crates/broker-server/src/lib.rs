#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! The work broker's HTTP process: config/CLI handling, the axum surface,
//! and process-level wiring (logging, metrics, graceful shutdown).

pub mod cli;
pub mod config;
pub mod http;
pub mod metrics;
pub mod shutdown;
pub mod time;
