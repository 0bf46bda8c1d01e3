//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + request ID layers)
//!     → middleware/gatekeeper.rs (validate, rate check, headers, audit)
//!     → upstream.rs (forward to the protected application)
//!     → response.rs (JSON bodies for short-circuited requests)
//!     → Send to client
//! ```

pub mod middleware;
pub mod response;
pub mod server;
pub mod upstream;

pub use middleware::{gatekeeper_middleware, Gatekeeper};
pub use server::HttpServer;
pub use upstream::{forward_handler, Upstream};
