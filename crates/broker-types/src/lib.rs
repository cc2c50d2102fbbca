#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Wire types and geodetic helpers shared between the broker and workers.

pub mod mercator;
pub mod wire;

pub use wire::{JobStatus, Task, Template, WorkerObservationView, WorkerStatus};
