//! Gatekeeper error taxonomy.

use axum::http::StatusCode;
use thiserror::Error;

use crate::security::{LimitClass, ValidationFailure};
use crate::store::StoreError;

/// Everything that can end the pipeline early.
///
/// Only the first two are user-correctable. `UpstreamStoreUnavailable` is
/// absorbed by fail-open degradation and should never become a response;
/// `InternalFault` is answered with a generic 500 and its detail stays in logs.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error("request rejected: {0}")]
    ValidationRejected(ValidationFailure),

    #[error("rate limit exceeded for {class} class")]
    RateLimited { class: LimitClass, retry_after: u64 },

    #[error("counter store unavailable: {0}")]
    UpstreamStoreUnavailable(#[from] StoreError),

    #[error("internal fault: {0}")]
    InternalFault(String),
}

impl GatekeeperError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatekeeperError::ValidationRejected(_) => StatusCode::BAD_REQUEST,
            GatekeeperError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatekeeperError::UpstreamStoreUnavailable(_) | GatekeeperError::InternalFault(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            GatekeeperError::ValidationRejected(failure) => failure.reason(),
            GatekeeperError::RateLimited { .. } => "rate_limited",
            GatekeeperError::UpstreamStoreUnavailable(_) => "store_unavailable",
            GatekeeperError::InternalFault(_) => "internal_fault",
        }
    }
}
