//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, limits and timeouts > 0; TTLs at most a day)
//! - Check addresses and the store URL scheme
//! - Check that CSP origins can be carried in a header value
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::security::rate_limit::LimitClass;

/// Longest rate-limit window or audit retention accepted, in seconds.
pub const MAX_TTL_SECS: u64 = 86_400;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rate_limit.{0}.requests must be greater than zero")]
    ZeroRequests(LimitClass),

    #[error("rate_limit.{0}.window_secs must be greater than zero")]
    ZeroWindow(LimitClass),

    #[error("rate_limit.{0}.window_secs must be at most {MAX_TTL_SECS}")]
    WindowTooLong(LimitClass),

    #[error("store.audit_retention_secs must be between 1 and {MAX_TTL_SECS}")]
    RetentionOutOfRange,

    #[error("validation.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("validation.suspicious_patterns contains an empty pattern")]
    EmptyPattern,

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("store.url is not a valid URL")]
    InvalidStoreUrl,

    #[error("store.url scheme '{0}' is not supported (expected redis, rediss or memory)")]
    UnsupportedStoreScheme(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("headers.connect_src_origins entry is not a valid CSP source: {0}")]
    InvalidOrigin(String),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for class in LimitClass::ALL {
        let policy = config.rate_limit.policy(class);
        if policy.requests == 0 {
            errors.push(ValidationError::ZeroRequests(class));
        }
        if policy.window_secs == 0 {
            errors.push(ValidationError::ZeroWindow(class));
        } else if policy.window_secs > MAX_TTL_SECS {
            errors.push(ValidationError::WindowTooLong(class));
        }
    }

    if config.validation.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config
        .validation
        .suspicious_patterns
        .iter()
        .any(|p| p.trim().is_empty())
    {
        errors.push(ValidationError::EmptyPattern);
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "upstream.address", &config.upstream.address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if let Some(raw) = config.store.url.as_deref() {
        match url::Url::parse(raw) {
            Ok(url) => {
                if !matches!(url.scheme(), "redis" | "rediss" | "memory") {
                    errors.push(ValidationError::UnsupportedStoreScheme(
                        url.scheme().to_string(),
                    ));
                }
            }
            Err(_) => errors.push(ValidationError::InvalidStoreUrl),
        }
    }

    if !(1..=MAX_TTL_SECS).contains(&config.store.audit_retention_secs) {
        errors.push(ValidationError::RetentionOutOfRange);
    }
    if config.store.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("store.connect_timeout_ms"));
    }
    if config.store.operation_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("store.operation_timeout_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("timeouts.connect_secs"));
    }

    for origin in &config.headers.connect_src_origins {
        let usable = !origin.is_empty()
            && !origin.contains(';')
            && !origin.contains(char::is_whitespace)
            && HeaderValue::from_str(origin).is_ok();
        if !usable {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::rate_limit::LimitPolicy;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatekeeperConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatekeeperConfig::default();
        config.rate_limit.auth = LimitPolicy::new(0, 0);
        config.validation.max_body_bytes = 0;
        config.listener.bind_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroRequests(LimitClass::Auth)));
        assert!(errors.contains(&ValidationError::ZeroWindow(LimitClass::Auth)));
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::InvalidAddress { field: "listener.bind_address", .. }
        )));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_store_scheme() {
        let mut config = GatekeeperConfig::default();
        config.store.url = Some("memcached://localhost:11211".into());
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::UnsupportedStoreScheme("memcached".into())])
        );

        config.store.url = Some("rediss://user:pw@cache:6380/0".into());
        assert_eq!(validate_config(&config), Ok(()));

        config.store.url = Some("memory://".into());
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_origin_cannot_inject_directives() {
        let mut config = GatekeeperConfig::default();
        config.headers.connect_src_origins = vec!["https://ok.example".into(), "x; script-src *".into()];
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidOrigin("x; script-src *".into())])
        );
    }

    #[test]
    fn test_ttls_are_bounded() {
        let mut config = GatekeeperConfig::default();
        config.rate_limit.default = LimitPolicy::new(100, u64::MAX);
        config.store.audit_retention_secs = u64::MAX;
        assert_eq!(
            validate_config(&config),
            Err(vec![
                ValidationError::WindowTooLong(LimitClass::Default),
                ValidationError::RetentionOutOfRange,
            ])
        );

        config.rate_limit.default = LimitPolicy::new(100, MAX_TTL_SECS);
        config.store.audit_retention_secs = MAX_TTL_SECS;
        assert_eq!(validate_config(&config), Ok(()));

        config.store.audit_retention_secs = 0;
        assert_eq!(validate_config(&config), Err(vec![ValidationError::RetentionOutOfRange]));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let mut config = GatekeeperConfig::default();
        config.validation.suspicious_patterns.push("  ".into());
        assert_eq!(validate_config(&config), Err(vec![ValidationError::EmptyPattern]));
    }
}
