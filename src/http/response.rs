//! Terminal responses for short-circuited requests.
//!
//! # Responsibilities
//! - Map the gatekeeper error taxonomy to status codes and JSON bodies
//! - Keep internals (keys, store details, panic payloads) out of client bodies
//!
//! # Design Decisions
//! - Body shape is always `{"error": string, ...context}`
//! - 429 carries `retry_after` in the body and a `Retry-After` header

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::GatekeeperError;

impl IntoResponse for GatekeeperError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            GatekeeperError::ValidationRejected(_) => {
                (status, Json(json!({ "error": "Invalid request format" }))).into_response()
            }
            GatekeeperError::RateLimited { retry_after, .. } => {
                let mut response = (
                    status,
                    Json(json!({ "error": "Rate limit exceeded", "retry_after": retry_after })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            GatekeeperError::UpstreamStoreUnavailable(_) | GatekeeperError::InternalFault(_) => {
                internal_error()
            }
        }
    }
}

/// Generic 500 with no detail.
pub fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// The upstream application could not be reached.
pub fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "Upstream request failed" })),
    )
        .into_response()
}
