//! Fixed-window rate limiting backed by the shared counter store.
//!
//! # Responsibilities
//! - Classify requests into limit classes by path shape
//! - Count requests per (client identity, class) in fixed windows
//! - Fail open whenever the store is absent or misbehaves
//!
//! # Design Decisions
//! - Windows are reset by key expiry in the store, not by local clocks
//! - Concurrent first requests may both initialise a window; the loser
//!   increments instead, so the count stays exact and admission is at most
//!   one request over the limit
//! - A store outage disables throttling rather than blocking traffic

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::identity::ClientIdentity;
use crate::store::{CounterStore, StoreError};

/// Coarse request category selecting a limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitClass {
    Default,
    Auth,
    Api,
}

impl LimitClass {
    pub const ALL: [LimitClass; 3] = [LimitClass::Default, LimitClass::Auth, LimitClass::Api];

    /// `/auth` anywhere in the path wins over `/api`.
    pub fn from_path(path: &str) -> Self {
        if path.contains("/auth") {
            LimitClass::Auth
        } else if path.contains("/api") {
            LimitClass::Api
        } else {
            LimitClass::Default
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LimitClass::Default => "default",
            LimitClass::Auth => "auth",
            LimitClass::Api => "api",
        }
    }
}

impl fmt::Display for LimitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum requests admitted per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPolicy {
    pub requests: u32,
    pub window_secs: u64,
}

impl LimitPolicy {
    pub const fn new(requests: u32, window_secs: u64) -> Self {
        Self {
            requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Counted and within the limit.
    Allowed,
    /// Window exhausted. `retry_after` is the class window, not the exact
    /// time remaining.
    Limited { retry_after: u64 },
    /// Not counted: limiting disabled or store unavailable (fail-open).
    Bypassed,
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, RateDecision::Limited { .. })
    }
}

/// Rate limiter over a [`CounterStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limits: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limits: RateLimitConfig) -> Self {
        Self { store, limits }
    }

    /// Store key for a client and class.
    pub fn counter_key(identity: &ClientIdentity, class: LimitClass) -> String {
        format!("rate_limit:{identity}:{class}")
    }

    pub fn policy(&self, class: LimitClass) -> LimitPolicy {
        self.limits.policy(class)
    }

    /// `true` unless the client's window for this class is exhausted.
    pub async fn allow(&self, identity: &ClientIdentity, class: LimitClass) -> bool {
        self.check(identity, class).await.is_allowed()
    }

    /// Count this request and decide.
    pub async fn check(&self, identity: &ClientIdentity, class: LimitClass) -> RateDecision {
        if !self.limits.enabled || !self.store.is_configured() {
            return RateDecision::Bypassed;
        }

        let policy = self.limits.policy(class);
        let key = Self::counter_key(identity, class);

        match self.count(&key, policy).await {
            Ok(decision) => {
                if let RateDecision::Limited { .. } = decision {
                    tracing::debug!(
                        client = %identity,
                        class = %class,
                        limit = policy.requests,
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.store.backend(),
                    class = %class,
                    error = %e,
                    "Counter store unavailable, admitting request (fail-open)"
                );
                metrics::record_store_degraded("rate_limit");
                RateDecision::Bypassed
            }
        }
    }

    async fn count(&self, key: &str, policy: LimitPolicy) -> Result<RateDecision, StoreError> {
        let window = policy.window();

        match self.store.get(key).await? {
            None => {
                if !self.store.init_counter(key, window).await? {
                    // Another request opened the window first.
                    self.store.incr(key, window).await?;
                }
                Ok(RateDecision::Allowed)
            }
            Some(current) if current < i64::from(policy.requests) => {
                self.store.incr(key, window).await?;
                Ok(RateDecision::Allowed)
            }
            Some(_) => Ok(RateDecision::Limited {
                retry_after: policy.window_secs,
            }),
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend())
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, NoopStore};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }
        async fn get(&self, _key: &str) -> Result<Option<i64>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn init_counter(&self, _key: &str, _ttl: Duration) -> Result<bool, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    fn limiter(store: Arc<dyn CounterStore>) -> RateLimiter {
        RateLimiter::new(store, RateLimitConfig::default())
    }

    #[test]
    fn test_classify_path() {
        assert_eq!(LimitClass::from_path("/auth/login"), LimitClass::Auth);
        assert_eq!(LimitClass::from_path("/v1/oauth/token"), LimitClass::Default);
        assert_eq!(LimitClass::from_path("/api/auth/refresh"), LimitClass::Auth);
        assert_eq!(LimitClass::from_path("/api/items"), LimitClass::Api);
        assert_eq!(LimitClass::from_path("/v2/api"), LimitClass::Api);
        assert_eq!(LimitClass::from_path("/"), LimitClass::Default);
    }

    #[test]
    fn test_counter_key() {
        let key = RateLimiter::counter_key(&"203.0.113.7".into(), LimitClass::Auth);
        assert_eq!(key, "rate_limit:203.0.113.7:auth");
    }

    #[tokio::test]
    async fn test_admits_exactly_max_requests() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = limiter(store.clone());
        let client = ClientIdentity::from("198.51.100.1");

        for _ in 0..5 {
            assert_eq!(limiter.check(&client, LimitClass::Auth).await, RateDecision::Allowed);
        }
        assert_eq!(
            limiter.check(&client, LimitClass::Auth).await,
            RateDecision::Limited { retry_after: 60 }
        );

        // A closed window is not incremented further.
        let key = RateLimiter::counter_key(&client, LimitClass::Auth);
        assert_eq!(store.get(&key).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_classes_and_clients_are_independent() {
        let limiter = limiter(Arc::new(InMemoryStore::new()));
        let client = ClientIdentity::from("198.51.100.1");
        for _ in 0..5 {
            limiter.check(&client, LimitClass::Auth).await;
        }
        assert!(!limiter.allow(&client, LimitClass::Auth).await);
        assert!(limiter.allow(&client, LimitClass::Default).await);
        assert!(limiter.allow(&"198.51.100.2".into(), LimitClass::Auth).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let limiter = limiter(Arc::new(InMemoryStore::new()));
        let client = ClientIdentity::from("198.51.100.1");
        for _ in 0..5 {
            limiter.check(&client, LimitClass::Auth).await;
        }
        assert!(!limiter.allow(&client, LimitClass::Auth).await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.check(&client, LimitClass::Auth).await, RateDecision::Allowed);
    }

    #[tokio::test]
    async fn test_lost_init_race_still_counts() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = limiter(store.clone());
        let client = ClientIdentity::from("198.51.100.1");
        let key = RateLimiter::counter_key(&client, LimitClass::Auth);

        // Simulate a concurrent request that initialised the window between
        // our read and our initialise: pre-create the entry, then count.
        store.init_counter(&key, Duration::from_secs(60)).await.unwrap();
        let policy = limiter.policy(LimitClass::Auth);
        let decision = limiter.count(&key, policy).await.unwrap();
        assert_eq!(decision, RateDecision::Allowed);
        assert_eq!(store.get(&key).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_fail_open_on_store_errors() {
        let limiter = limiter(Arc::new(BrokenStore));
        let client = ClientIdentity::from("198.51.100.1");
        for _ in 0..20 {
            assert_eq!(limiter.check(&client, LimitClass::Auth).await, RateDecision::Bypassed);
        }
    }

    #[tokio::test]
    async fn test_unrepresentable_window_fails_open() {
        let config = RateLimitConfig {
            default: LimitPolicy::new(1, u64::MAX),
            ..Default::default()
        };
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new()), config);
        let client = ClientIdentity::from("198.51.100.1");
        for _ in 0..3 {
            assert_eq!(limiter.check(&client, LimitClass::Default).await, RateDecision::Bypassed);
        }
    }

    #[tokio::test]
    async fn test_not_configured_bypasses() {
        let limiter = limiter(Arc::new(NoopStore));
        assert!(limiter.allow(&"x".into(), LimitClass::Auth).await);
    }

    #[tokio::test]
    async fn test_disabled_bypasses() {
        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new()), config);
        let client = ClientIdentity::from("198.51.100.1");
        for _ in 0..10 {
            assert_eq!(limiter.check(&client, LimitClass::Auth).await, RateDecision::Bypassed);
        }
    }
}
