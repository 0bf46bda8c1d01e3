//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Configuration errors are fatal; an unreachable counter store is not
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, GatekeeperConfig};
use crate::http::{Gatekeeper, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Assemble the server from a validated configuration.
pub async fn build(config: GatekeeperConfig) -> Result<HttpServer, StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = store::connect(&config.store).await;
    tracing::info!(
        backend = store.backend(),
        enforcing = store.is_configured() && config.rate_limit.enabled,
        "Counter store ready"
    );

    let gatekeeper = Arc::new(Gatekeeper::new(&config, store)?);
    Ok(HttpServer::new(config, gatekeeper)?)
}

/// Build, bind and serve until SIGINT/SIGTERM.
pub async fn run(config: GatekeeperConfig) -> Result<(), StartupError> {
    let address = config.listener.bind_address.clone();
    let server = build(config).await?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await.map_err(StartupError::Serve)?;
    tracing::info!("Shutdown complete");
    Ok(())
}
