//! Maps broker-core errors and not-found conditions onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use broker_core::BrokerError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Wraps a [`BrokerError`] so it can be returned directly from a handler.
pub(crate) struct ApiError(pub(crate) BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BrokerError::DuplicateJob(_) => StatusCode::CONFLICT,
            BrokerError::InvalidTemplate(_) => StatusCode::BAD_REQUEST,
            BrokerError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

/// A handler-friendly "not found" response for unknown jobs or task indices.
pub(crate) fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: message.into() })).into_response()
}
