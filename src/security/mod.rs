//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (resolve client identity)
//!     → validator.rs (declared size, URL and header patterns)
//!     → rate_limit.rs (per identity and limit class, via the counter store)
//!     → Pass to downstream handler
//! Outgoing response:
//!     → headers.rs (merge security header set)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail open on internal or store errors: availability over strict enforcement
//! - No trust in client input; identity is a correlation key only

pub mod headers;
pub mod identity;
pub mod rate_limit;
pub mod sanitize;
pub mod validator;

pub use headers::HeaderPolicy;
pub use identity::ClientIdentity;
pub use rate_limit::{LimitClass, LimitPolicy, RateDecision, RateLimiter};
pub use validator::{RequestValidator, SuspiciousPatternSet, ValidationFailure};
