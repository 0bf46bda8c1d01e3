//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

use edge_gatekeeper::config::GatekeeperConfig;
use edge_gatekeeper::store::{CounterStore, StoreError};
use edge_gatekeeper::{Gatekeeper, HttpServer};

/// Defaults with the metrics exporter off and rate limiting on.
pub fn test_config() -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.observability.metrics_enabled = false;
    config
}

/// Wrap `app` exactly as the server does.
pub fn protected(config: &GatekeeperConfig, store: Arc<dyn CounterStore>, app: Router) -> Router {
    let gatekeeper = Arc::new(Gatekeeper::new(config, store).unwrap());
    HttpServer::build_router(config, gatekeeper, app)
}

/// Drive one request through a router in-process.
pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub fn request_from(client: &str, method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Store whose every operation fails, as an unreachable backend would.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
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

/// Start a mock upstream on an ephemeral port that answers every request
/// with 200, `body`, and the given extra headers.
pub async fn start_mock_backend(body: &'static str, extra_headers: &'static [(&'static str, &'static str)]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        // Read the request head before answering.
                        let mut buf = Vec::with_capacity(1024);
                        let mut chunk = [0u8; 1024];
                        loop {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => {
                                    buf.extend_from_slice(&chunk[..n]);
                                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                            }
                        }

                        let mut head = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n",
                            body.len()
                        );
                        for (name, value) in extra_headers {
                            head.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        let response = format!("{}\r\n{}", head, body);
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
