//! Request validation against size and content-pattern rules.
//!
//! # Responsibilities
//! - Enforce the declared body size ceiling (`Content-Length`)
//! - Reject URLs carrying script or markup injection indicators
//! - Reject headers carrying the same indicators
//!
//! # Design Decisions
//! - Stateless: one immutable pattern set shared by every request
//! - Missing `Content-Length` is not a rejection on its own
//! - Internal errors (e.g. an unparsable `Content-Length`) admit the
//!   request; the same availability-first stance as the rate limiter

use axum::http::{header, HeaderMap, Uri};
use thiserror::Error;

use crate::config::ValidationConfig;

/// Why a request failed validation. Never sent to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("declared body of {declared} bytes exceeds {limit}")]
    BodyTooLarge { declared: u64, limit: u64 },

    #[error("suspicious pattern '{pattern}' in URL")]
    SuspiciousUrl { pattern: String },

    #[error("suspicious pattern '{pattern}' in header {name}")]
    SuspiciousHeader { name: String, pattern: String },
}

impl ValidationFailure {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::SuspiciousUrl { .. } => "suspicious_url",
            Self::SuspiciousHeader { .. } => "suspicious_header",
        }
    }
}

/// Lower-cased, immutable set of case-insensitive substrings.
#[derive(Debug, Clone)]
pub struct SuspiciousPatternSet {
    patterns: Vec<String>,
}

impl SuspiciousPatternSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        patterns.dedup();
        Self { patterns }
    }

    /// First pattern contained in already lower-cased `haystack`.
    pub fn find_in(&self, haystack: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| haystack.contains(p.as_str()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Validation policy for inbound requests.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_body_bytes: u64,
    patterns: SuspiciousPatternSet,
}

/// Internal problem while validating; converted to "admit".
#[derive(Debug)]
enum ValidationFault {
    UnreadableContentLength(String),
}

impl RequestValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            patterns: SuspiciousPatternSet::new(&config.suspicious_patterns),
        }
    }

    pub fn max_body_bytes(&self) -> u64 {
        self.max_body_bytes
    }

    /// `Ok(())` admits the request.
    pub fn validate(&self, uri: &Uri, headers: &HeaderMap) -> Result<(), ValidationFailure> {
        match self.inspect(uri, headers) {
            Ok(verdict) => verdict,
            Err(ValidationFault::UnreadableContentLength(raw)) => {
                tracing::warn!(
                    content_length = %raw,
                    "Request validation error, admitting request (fail-open)"
                );
                Ok(())
            }
        }
    }

    pub fn is_valid(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        self.validate(uri, headers).is_ok()
    }

    fn inspect(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Result<(), ValidationFailure>, ValidationFault> {
        if let Some(value) = headers.get(header::CONTENT_LENGTH) {
            let raw = String::from_utf8_lossy(value.as_bytes());
            let declared: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ValidationFault::UnreadableContentLength(raw.to_string()))?;
            if declared > self.max_body_bytes {
                return Ok(Err(ValidationFailure::BodyTooLarge {
                    declared,
                    limit: self.max_body_bytes,
                }));
            }
        }

        let url = uri.to_string().to_lowercase();
        let decoded = String::from_utf8_lossy(&urlencoding::decode_binary(url.as_bytes())).to_lowercase();
        if let Some(pattern) = self
            .patterns
            .find_in(&url)
            .or_else(|| self.patterns.find_in(&decoded))
        {
            tracing::warn!(pattern, "Suspicious pattern detected in URL");
            return Ok(Err(ValidationFailure::SuspiciousUrl {
                pattern: pattern.to_string(),
            }));
        }

        for (name, value) in headers {
            let pair = format!("{}:{}", name, String::from_utf8_lossy(value.as_bytes())).to_lowercase();
            if let Some(pattern) = self.patterns.find_in(&pair) {
                tracing::warn!(pattern, header = %name, "Suspicious pattern detected in header");
                return Ok(Err(ValidationFailure::SuspiciousHeader {
                    name: name.to_string(),
                    pattern: pattern.to_string(),
                }));
            }
        }

        Ok(Ok(()))
    }
}
