//! Shared state every handler gets a clone of.

use broker_core::BrokerHandle;

/// Axum application state: just the broker handle. Cloning is cheap, it's
/// a wrapped `mpsc::Sender`.
#[derive(Clone)]
pub struct AppState {
    /// Front for the broker actor.
    pub broker: BrokerHandle,
}
