//! Counter store subsystem.
//!
//! # Data Flow
//! ```text
//! RateLimiter / AuditLogger
//!     → CounterStore trait (get, init_counter, incr, put)
//!     → redis.rs   (shared, network-backed)
//!     → memory.rs  (single instance, in-process)
//!     → NoopStore  (not configured: every call reports NotConfigured)
//! ```
//!
//! # Design Decisions
//! - The store is optional; callers treat every error as "unavailable" and fail open
//! - Atomicity comes from the backend's increment primitive, never from local locks
//! - Every network call is bounded by a timeout

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StoreConfig;

pub use self::memory::InMemoryStore;

/// How often the in-process store drops expired entries.
pub const MEMORY_SWEEP_PERIOD: Duration = Duration::from_secs(30);
pub use self::redis::RedisStore;

/// Errors talking to a counter store.
///
/// None of these ever reach a client; they only drive fail-open degradation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No store was configured for this process.
    #[error("counter store not configured")]
    NotConfigured,

    /// The operation did not complete within the configured deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Backend-level failure (connection refused, protocol error, ...).
    #[error("backend error: {0}")]
    Backend(String),

    /// The expiry cannot be represented by the backend's clock.
    #[error("ttl of {0:?} is out of range")]
    TtlOutOfRange(Duration),

    /// A stored value could not be interpreted as a counter.
    #[error("value under key is not an integer counter")]
    NotACounter,
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Shared key-value counter service.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Whether a real backend sits behind this handle.
    fn is_configured(&self) -> bool {
        true
    }

    /// `GET key`: current counter value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// `SET key 1 EX ttl NX`: returns `true` if this call created the entry.
    async fn init_counter(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// `INCR key`, returning the new value. A key recreated by the increment
    /// gets `ttl` so it can never outlive its window.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// `SET key value EX ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Stand-in used when no store is configured or the configured one is unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

#[async_trait]
impl CounterStore for NoopStore {
    fn backend(&self) -> &'static str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Result<Option<i64>, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn init_counter(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64, StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::NotConfigured)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::NotConfigured)
    }
}

/// Build the store selected by configuration.
///
/// Never fails: an absent URL, or a Redis endpoint that cannot be reached
/// within the connect timeout, yields a [`NoopStore`] and the gatekeeper runs
/// in fail-open mode.
pub async fn connect(config: &StoreConfig) -> Arc<dyn CounterStore> {
    let Some(url) = config.url.as_deref() else {
        tracing::warn!("No counter store configured, rate limiting runs in fail-open mode");
        return Arc::new(NoopStore);
    };

    if url.starts_with("memory:") {
        tracing::info!("Using in-process counter store");
        let store = Arc::new(InMemoryStore::new());
        store.spawn_sweeper(MEMORY_SWEEP_PERIOD);
        return store;
    }

    match RedisStore::connect(url, config.connect_timeout(), config.operation_timeout()).await {
        Ok(store) => {
            tracing::info!(
                operation_timeout_ms = config.operation_timeout_ms,
                "Redis counter store connected"
            );
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Redis counter store unreachable, rate limiting runs in fail-open mode"
            );
            Arc::new(NoopStore)
        }
    }
}
