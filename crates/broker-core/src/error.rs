//! Error types surfaced by [`crate::broker`]. Missing-entity conditions
//! (unknown job, unknown task index) are reported as `bool`/`Option`
//! returns rather than errors; this enum covers the cases an HTTP layer
//! should turn into a 4xx or 5xx with an explanatory body.

use thiserror::Error;

/// Errors the broker actor can return to a caller.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// `enqueueJob` was called with a job id already present in the ring.
    #[error("job '{0}' already exists")]
    DuplicateJob(String),

    /// A submitted template failed validation.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// The broker actor's command channel is closed; it has shut down.
    #[error("broker is not running")]
    Shutdown,
}
