//! Client identity resolution.
//!
//! The identity is a correlation key for rate limiting and audit, never an
//! authenticated principal.

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Sentinel used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort network identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Resolve from request headers and the direct peer.
    ///
    /// Order: first hop of `X-Forwarded-For`, then `X-Real-IP`, then the peer
    /// address, then [`UNKNOWN_CLIENT`].
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        if let Some(first) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return Self(first.to_string());
        }

        if let Some(real_ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return Self(real_ip.to_string());
        }

        match peer {
            Some(addr) => Self(addr.ip().to_string()),
            None => Self(UNKNOWN_CLIENT.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.1.2.3:55555".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(ClientIdentity::resolve(&headers, peer()).as_str(), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_when_no_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(ClientIdentity::resolve(&headers, peer()).as_str(), "198.51.100.2");
    }

    #[test]
    fn test_empty_first_hop_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(", 10.0.0.1"));
        assert_eq!(ClientIdentity::resolve(&headers, peer()).as_str(), "10.1.2.3");
    }

    #[test]
    fn test_peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(ClientIdentity::resolve(&headers, peer()).as_str(), "10.1.2.3");
        assert_eq!(ClientIdentity::resolve(&headers, None).as_str(), UNKNOWN_CLIENT);
    }
}
