//! Error-to-status mapping for the HTTP API.
//!
//! ```text
//! Configuration              → 500
//! StoreUnavailable/Cancelled → 503
//! BrokenCircuit              → 503
//! bad key / strategy         → 400
//! ```
//!
//! The permit route answers `false` rather than failing, so `BrokenCircuit`
//! only reaches this mapping from handlers that run work through
//! [`BreakerGuard`](crate::admission::BreakerGuard).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admission::UnknownStrategy;
use crate::error::BreakerError;

#[derive(Debug)]
pub enum ApiError {
    Breaker(BreakerError),
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Breaker(BreakerError::Configuration { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Breaker(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            ApiError::Breaker(e) => {
                if status.is_server_error() {
                    tracing::warn!(error = %e, status = status.as_u16(), "Breaker request failed");
                }
                e.to_string()
            }
            ApiError::BadRequest(message) => message,
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<BreakerError> for ApiError {
    fn from(e: BreakerError) -> Self {
        ApiError::Breaker(e)
    }
}

impl From<UnknownStrategy> for ApiError {
    fn from(e: UnknownStrategy) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}
