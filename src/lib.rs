//! Edge gatekeeper library.
//!
//! Validates, rate limits and hardens HTTP traffic in front of an application,
//! then forwards what it admits to a single upstream.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::GatekeeperConfig;
pub use error::GatekeeperError;
pub use http::{Gatekeeper, HttpServer};
pub use lifecycle::Shutdown;
pub use store::CounterStore;
