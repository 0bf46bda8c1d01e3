//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: gatekeeper pipeline in front of the upstream forwarder
//! - Wire up ambient middleware (tracing, request ID, timeout, body limit)
//! - Bind to a listener and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, GatekeeperConfig};
use crate::http::middleware::Gatekeeper;
use crate::http::upstream::{forward_handler, Upstream};

/// HTTP server for the gatekeeper.
pub struct HttpServer {
    router: Router,
    config: GatekeeperConfig,
}

impl HttpServer {
    /// Create a server forwarding admitted traffic to the configured upstream.
    pub fn new(config: GatekeeperConfig, gatekeeper: Arc<Gatekeeper>) -> Result<Self, ConfigError> {
        let upstream = Upstream::new(&config.upstream, &config.timeouts).map_err(ConfigError::Upstream)?;
        let app = Router::new().fallback(forward_handler).with_state(upstream);
        let router = Self::build_router(&config, gatekeeper, app);
        Ok(Self { router, config })
    }

    /// Wrap `app` with the gatekeeper and the ambient layers.
    ///
    /// Timeout and body limit sit inside the gatekeeper so their responses
    /// still receive the security headers and an audit record.
    #[allow(deprecated)]
    pub fn build_router(config: &GatekeeperConfig, gatekeeper: Arc<Gatekeeper>, app: Router) -> Router {
        let body_limit = usize::try_from(config.validation.max_body_bytes).unwrap_or(usize::MAX);
        let inner = app
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(body_limit));

        gatekeeper
            .protect(inner)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "Gatekeeper listening"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
