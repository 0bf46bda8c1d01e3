//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gatekeeper.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::rate_limit::{LimitClass, LimitPolicy};

/// Root configuration for the gatekeeper.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream application the binary forwards admitted requests to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// External counter store.
    pub store: StoreConfig,

    /// Per-class fixed-window limits.
    pub rate_limit: RateLimitConfig,

    /// Request validation policy.
    pub validation: ValidationConfig,

    /// Security response headers.
    pub headers: HeadersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for the downstream handler) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `redis://`, `rediss://` or `memory://`. Absent means fail-open mode.
    pub url: Option<String>,

    /// Connect (and initial PING) timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Per-operation timeout in milliseconds.
    pub operation_timeout_ms: u64,

    /// Write audit records to the store as well as the log.
    pub persist_audit: bool,

    /// Retention of persisted audit records in seconds.
    pub audit_retention_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_ms: 2000,
            operation_timeout_ms: 1000,
            persist_audit: true,
            audit_retention_secs: 3600,
        }
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn audit_retention(&self) -> Duration {
        Duration::from_secs(self.audit_retention_secs)
    }
}

/// Fixed-window limit table, one policy per class.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Policy for paths matching neither `/auth` nor `/api`.
    pub default: LimitPolicy,

    /// Policy for paths containing `/auth`.
    pub auth: LimitPolicy,

    /// Policy for paths containing `/api`.
    pub api: LimitPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default: LimitPolicy::new(100, 60), // 100 per minute
            auth: LimitPolicy::new(5, 60),      // 5 per minute
            api: LimitPolicy::new(1000, 3600),  // 1000 per hour
        }
    }
}

impl RateLimitConfig {
    /// Policy for a limit class.
    pub fn policy(&self, class: LimitClass) -> LimitPolicy {
        match class {
            LimitClass::Default => self.default,
            LimitClass::Auth => self.auth,
            LimitClass::Api => self.api,
        }
    }

    pub(crate) fn policy_mut(&mut self, class: LimitClass) -> &mut LimitPolicy {
        match class {
            LimitClass::Default => &mut self.default,
            LimitClass::Auth => &mut self.auth,
            LimitClass::Api => &mut self.api,
        }
    }
}

/// Request validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum declared body size in bytes.
    pub max_body_bytes: u64,

    /// Case-insensitive substrings rejected in URLs and headers.
    pub suspicious_patterns: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            suspicious_patterns: default_suspicious_patterns(),
        }
    }
}

/// Built-in script and markup injection indicators.
pub fn default_suspicious_patterns() -> Vec<String> {
    [
        "<script",
        "javascript:",
        "data:text/html",
        "eval(",
        "document.cookie",
        "window.location",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Security header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Extra `connect-src` origins for realtime messaging.
    pub connect_src_origins: Vec<String>,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            connect_src_origins: vec![
                "https://*.supabase.co".to_string(),
                "wss://*.supabase.co".to_string(),
            ],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
