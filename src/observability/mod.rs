//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every pipeline stage produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Once per request:
//!     → audit.rs (audit record → `audit` log target, counter store)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → External monitoring reading `request_log:*` keys
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the audit record
//! - Metrics are cheap (atomic increments)

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditLogger, AuditRecord, Outcome, RequestSnapshot};
