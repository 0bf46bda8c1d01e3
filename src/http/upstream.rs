//! Forwarding to the protected application.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the configured upstream
//! - Drop hop-by-hop headers in both directions
//! - Map connection failures to 502
//!
//! # Design Decisions
//! - One upstream, no routing or retries: the gatekeeper only guards
//! - Bodies are streamed, never buffered

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::uri::{Authority, InvalidUri, Scheme};
use axum::http::{header, HeaderMap, HeaderName, Uri};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::http::response::bad_gateway;

/// Shared client for the single upstream.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, InvalidUri> {
        let authority = Authority::from_str(&config.address)?;
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client, authority })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    fn target(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

/// Fallback handler: forward whatever reached the end of the pipeline.
pub async fn forward_handler(State(upstream): State<Upstream>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    parts.uri = match upstream.target(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build upstream URI");
            return bad_gateway();
        }
    };
    strip_hop_by_hop(&mut parts.headers);
    // HTTP/2 clients send :authority only; give the upstream a Host.
    if !parts.headers.contains_key(header::HOST) {
        if let Ok(host) = upstream.authority.as_str().parse() {
            parts.headers.insert(header::HOST, host);
        }
    }
    parts.version = axum::http::Version::HTTP_11;

    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match upstream.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                upstream = %upstream.authority,
                error = %e,
                "Upstream error"
            );
            bad_gateway()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop_by_hop: [HeaderName; 7] = [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ];
    for name in hop_by_hop {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn upstream() -> Upstream {
        Upstream::new(
            &UpstreamConfig {
                address: "127.0.0.1:3000".into(),
            },
            &TimeoutConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_target_keeps_path_and_query() {
        let uri: Uri = "/api/items?page=2".parse().unwrap();
        let target = upstream().target(&uri).unwrap();
        assert_eq!(target.to_string(), "http://127.0.0.1:3000/api/items?page=2");
    }

    #[tokio::test]
    async fn test_target_defaults_to_root() {
        let uri: Uri = "http://example.com".parse().unwrap();
        let target = upstream().target(&uri).unwrap();
        assert_eq!(target.to_string(), "http://127.0.0.1:3000/");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        // Port 9 (discard) is not expected to be listening.
        let upstream = Upstream::new(
            &UpstreamConfig {
                address: "127.0.0.1:9".into(),
            },
            &TimeoutConfig::default(),
        )
        .unwrap();
        let request = axum::http::Request::builder()
            .uri("/ping")
            .body(Body::empty())
            .unwrap();
        let response = forward_handler(State(upstream), request).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
