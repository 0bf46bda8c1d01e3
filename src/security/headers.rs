//! Security response headers.
//!
//! # Responsibilities
//! - Build the fixed security header set once at startup
//! - Merge it into every outgoing response, rejections included
//!
//! # Design Decisions
//! - Values are policy constants; only the CSP `connect-src` allowlist is
//!   configurable
//! - Merging overwrites on name collision, so applying twice is a no-op

use axum::http::header::{self, HeaderName, HeaderValue, InvalidHeaderValue};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::config::HeadersConfig;

pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

const CSP_BASE: &str = "default-src 'self'; \
     script-src 'self' 'unsafe-inline'; \
     style-src 'self' 'unsafe-inline'; \
     img-src 'self' data: https:; \
     font-src 'self'; \
     connect-src 'self'";

const PERMISSIONS: &str = "geolocation=(), microphone=(), camera=(), \
     payment=(), usb=(), magnetometer=(), gyroscope=()";

/// Ordered, immutable security header set.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderPolicy {
    pub fn new(config: &HeadersConfig) -> Result<Self, InvalidHeaderValue> {
        let mut csp = CSP_BASE.to_string();
        for origin in &config.connect_src_origins {
            csp.push(' ');
            csp.push_str(origin);
        }

        let headers = vec![
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (header::CONTENT_SECURITY_POLICY, HeaderValue::from_str(&csp)?),
            (PERMISSIONS_POLICY, HeaderValue::from_static(PERMISSIONS)),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
            ),
            (header::PRAGMA, HeaderValue::from_static("no-cache")),
            (header::EXPIRES, HeaderValue::from_static("0")),
        ];

        Ok(Self { headers })
    }

    /// Merge the policy into a header map, replacing existing values.
    pub fn apply_to(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }

    /// Response in, hardened response out.
    pub fn apply(&self, mut response: Response) -> Response {
        self.apply_to(response.headers_mut());
        response
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

    pub fn get(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}
