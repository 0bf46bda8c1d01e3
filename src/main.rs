//! Edge gatekeeper.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────┐
//!                       │                     GATEKEEPER                        │
//!     Client Request    │  ┌──────────┐   ┌──────────┐   ┌──────────────┐      │
//!     ──────────────────┼─▶│validator │──▶│  rate    │──▶│  upstream    │──────┼──▶ Application
//!                       │  │          │   │ limiter  │   │  forwarder   │      │
//!                       │  └────┬─────┘   └────┬─────┘   └──────┬───────┘      │
//!                       │       │ 400          │ 429            │             │
//!                       │       ▼              ▼                ▼             │
//!     Client Response   │  ┌──────────────────────────────────────────┐       │
//!     ◀─────────────────┼──│  security headers  →  audit record       │       │
//!                       │  └──────────────────────────────────────────┘       │
//!                       │                                                      │
//!                       │  counter store: redis | memory | none (fail open)    │
//!                       └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_gatekeeper::config;
use edge_gatekeeper::lifecycle;
use edge_gatekeeper::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "edge-gatekeeper", version, about = "HTTP edge gatekeeper")]
struct Args {
    /// Optional TOML configuration file; GATEKEEPER_* variables override it.
    #[arg(short, long, env = "GATEKEEPER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = config::load(args.config.as_deref())?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
