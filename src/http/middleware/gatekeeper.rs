//! Gatekeeper middleware.
//! Admits, classifies and hardens every request in front of the application.
//!
//! ```text
//! Received ─→ Validated ─→ RateChecked ─→ Dispatched ─→ HeadersApplied ─→ Logged ─→ Returned
//!     └─→ RejectedByValidation ─┐  └─→ RejectedByRateLimit ─┐
//!                               └──────────→ HeadersApplied ←┘
//! any fault ───────────────────────────────→ HeadersApplied (500)
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::FutureExt;

use crate::config::{ConfigError, GatekeeperConfig};
use crate::error::GatekeeperError;
use crate::http::response::internal_error;
use crate::observability::{metrics, AuditLogger, AuditRecord, Outcome, RequestSnapshot};
use crate::security::{HeaderPolicy, RateDecision, RateLimiter, RequestValidator};
use crate::store::CounterStore;

/// The assembled pipeline: validator, limiter, header policy and audit sink.
#[derive(Debug)]
pub struct Gatekeeper {
    validator: RequestValidator,
    limiter: RateLimiter,
    headers: HeaderPolicy,
    audit: AuditLogger,
}

impl Gatekeeper {
    /// Build from validated configuration and the selected store.
    pub fn new(config: &GatekeeperConfig, store: Arc<dyn CounterStore>) -> Result<Self, ConfigError> {
        Ok(Self {
            validator: RequestValidator::new(&config.validation),
            limiter: RateLimiter::new(store.clone(), config.rate_limit.clone()),
            headers: HeaderPolicy::new(&config.headers).map_err(ConfigError::Header)?,
            audit: AuditLogger::new(store, &config.store),
        })
    }

    pub fn header_policy(&self) -> &HeaderPolicy {
        &self.headers
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Wrap every route of `router`.
    pub fn protect(self: Arc<Self>, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(self, gatekeeper_middleware))
    }

    /// Validation, then the rate check. `Ok` carries how the request was counted.
    pub async fn admit(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        snapshot: &RequestSnapshot,
    ) -> Result<RateDecision, GatekeeperError> {
        self.validator
            .validate(uri, headers)
            .map_err(GatekeeperError::ValidationRejected)?;

        match self.limiter.check(&snapshot.identity, snapshot.class).await {
            RateDecision::Limited { retry_after } => Err(GatekeeperError::RateLimited {
                class: snapshot.class,
                retry_after,
            }),
            decision => Ok(decision),
        }
    }

    async fn process(&self, request: Request, next: Next, snapshot: &RequestSnapshot) -> (Response, Outcome) {
        let admission = self.admit(request.uri(), request.headers(), snapshot).await;
        match admission {
            Ok(_) => (next.run(request).await, Outcome::Admitted),
            Err(rejection) => {
                let outcome = match &rejection {
                    GatekeeperError::ValidationRejected(_) => Outcome::RejectedByValidation,
                    GatekeeperError::RateLimited { .. } => Outcome::RejectedByRateLimit,
                    GatekeeperError::UpstreamStoreUnavailable(_) | GatekeeperError::InternalFault(_) => {
                        tracing::error!(
                            request_id = %snapshot.request_id,
                            error = %rejection,
                            "Gatekeeper fault"
                        );
                        Outcome::InternalFault
                    }
                };
                metrics::record_rejection(rejection.reason());
                (rejection.into_response(), outcome)
            }
        }
    }
}

/// Axum middleware running the full pipeline for one request.
pub async fn gatekeeper_middleware(
    State(gatekeeper): State<Arc<Gatekeeper>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let snapshot = RequestSnapshot::capture(request.method(), request.uri(), request.headers(), peer);

    let pipeline = AssertUnwindSafe(gatekeeper.process(request, next, &snapshot)).catch_unwind();
    let (response, outcome) = match pipeline.await {
        Ok(result) => result,
        Err(panic) => {
            tracing::error!(
                request_id = %snapshot.request_id,
                method = %snapshot.method,
                path = %snapshot.path,
                detail = %panic_detail(panic.as_ref()),
                "Unhandled fault in request pipeline"
            );
            metrics::record_rejection("internal_fault");
            (internal_error(), Outcome::InternalFault)
        }
    };

    let response = gatekeeper.headers.apply(response);

    gatekeeper.audit.record(AuditRecord::new(
        &snapshot,
        response.status(),
        response.headers(),
        start.elapsed(),
        outcome,
    ));
    metrics::record_request(
        snapshot.method.as_str(),
        response.status().as_u16(),
        snapshot.class.as_str(),
        outcome.as_str(),
        start,
    );

    response
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
