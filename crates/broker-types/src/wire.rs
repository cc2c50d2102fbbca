//! Wire DTOs crossing the broker's HTTP boundary.

use serde::{Deserialize, Serialize};

/// Submitter-provided request that expands into one [`crate::wire::Task`]
/// per origin in a `width` x `height` grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Globally unique job id, supplied by the submitter.
    pub job_id: String,
    /// Transport network graph identifier.
    pub graph_id: String,
    /// Worker code version required to process this job.
    pub version: String,
    /// Grid width, in origins.
    pub width: u32,
    /// Grid height, in origins.
    pub height: u32,
    /// Web Mercator zoom level the grid is anchored at.
    pub zoom: u8,
    /// Longitude of the grid's top-left pixel.
    pub west: f64,
    /// Latitude of the grid's top-left pixel.
    pub north: f64,
    /// Opaque request body forwarded to workers unexamined.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A single unit of work handed to a worker by `dequeueWork`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Owning job id.
    pub job_id: String,
    /// Index of this task within the job's `width * height` grid.
    pub task_index: u32,
    /// Column of the origin within the grid (`task_index % width`).
    pub grid_x: u32,
    /// Row of the origin within the grid (`task_index / width`).
    pub grid_y: u32,
    /// Geodetic longitude of the origin's cell center.
    pub lon: f64,
    /// Geodetic latitude of the origin's cell center.
    pub lat: f64,
    /// The template's opaque payload, unmodified.
    pub payload: serde_json::Value,
}

/// Heartbeat/poll body a worker sends to `dequeueWork`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Worker identifier, stable across polls.
    pub worker_id: String,
    /// Graph id the worker has loaded. Empty means "any graph" (debug affordance).
    #[serde(default)]
    pub graph_id: String,
    /// Worker code version. The sentinel `"UNKNOWN"` means "any version".
    #[serde(default = "unknown_version")]
    pub version: String,
    /// Worker's reachable IP address, for diagnostics.
    #[serde(default)]
    pub ip_address: String,
}

fn unknown_version() -> String {
    "UNKNOWN".to_string()
}

/// Point-in-time view of a single worker, returned by `GET /workers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerObservationView {
    /// Worker identifier.
    pub worker_id: String,
    /// Graph id the worker has loaded.
    pub graph_id: String,
    /// Worker code version.
    pub version: String,
    /// Worker's last-known IP address.
    pub ip_address: String,
    /// Milliseconds since UNIX epoch of the last poll.
    pub last_seen_millis: i64,
}

/// Point-in-time view of a single job, returned by `GET /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatus {
    /// Job id.
    pub job_id: String,
    /// Transport network graph id.
    pub graph_id: String,
    /// Worker code version required by this job.
    pub version: String,
    /// Total number of tasks in the job.
    pub total: u32,
    /// Number of tasks marked complete.
    pub complete: u32,
    /// Number of tasks not yet marked complete (`total - complete`).
    pub incomplete: u32,
    /// Number of full redelivery sweeps performed so far.
    pub delivery_pass: u32,
}
