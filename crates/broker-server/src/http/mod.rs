//! The broker's HTTP surface: axum routes over a [`state::AppState`].

mod error;
mod routes;
mod state;

pub use routes::router;
pub use state::AppState;
