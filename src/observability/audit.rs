//! Per-request audit records.
//!
//! # Responsibilities
//! - Capture request facts before the request is handed downstream
//! - Emit one structured record per request on the `audit` target
//! - Best-effort copy into the counter store for short-lived retention
//!
//! # Design Decisions
//! - Recording never fails and never blocks the response: store writes are
//!   spawned and their errors only logged at DEBUG
//! - Records are write-only for the gatekeeper; external monitoring reads them

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::StoreConfig;
use crate::observability::metrics;
use crate::security::{ClientIdentity, LimitClass};
use crate::store::CounterStore;

/// Where the pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Admitted,
    RejectedByValidation,
    RejectedByRateLimit,
    InternalFault,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Admitted => "admitted",
            Outcome::RejectedByValidation => "rejected_by_validation",
            Outcome::RejectedByRateLimit => "rejected_by_rate_limit",
            Outcome::InternalFault => "internal_fault",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request facts captured on entry, before the request is consumed.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub identity: ClientIdentity,
    pub user_agent: String,
    pub class: LimitClass,
}

impl RequestSnapshot {
    pub fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let user_agent = headers
            .get(header::USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();

        Self {
            request_id,
            method: method.clone(),
            path: uri.path().to_string(),
            identity: ClientIdentity::resolve(headers, peer),
            user_agent,
            class: LimitClass::from_path(uri.path()),
        }
    }
}

/// One processed request.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub client_identity: String,
    pub user_agent: String,
    pub status_code: u16,
    /// Seconds, millisecond precision.
    pub duration: f64,
    pub content_length: u64,
    pub limit_class: LimitClass,
    pub outcome: Outcome,
    /// Server-generated store identity; client headers never shape the key.
    #[serde(skip)]
    entry_id: uuid::Uuid,
}

impl AuditRecord {
    pub fn new(
        snapshot: &RequestSnapshot,
        status: StatusCode,
        response_headers: &HeaderMap,
        elapsed: Duration,
        outcome: Outcome,
    ) -> Self {
        let content_length = response_headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            timestamp: Utc::now(),
            request_id: snapshot.request_id.clone(),
            method: snapshot.method.to_string(),
            path: snapshot.path.clone(),
            client_identity: snapshot.identity.to_string(),
            user_agent: snapshot.user_agent.clone(),
            status_code: status.as_u16(),
            duration: (elapsed.as_secs_f64() * 1000.0).round() / 1000.0,
            content_length,
            limit_class: snapshot.class,
            outcome,
            entry_id: uuid::Uuid::new_v4(),
        }
    }

    /// Time-bucketed store key, unique per record.
    pub fn store_key(&self) -> String {
        format!("request_log:{}:{}", self.timestamp.timestamp(), self.entry_id.simple())
    }
}

/// Audit sink: structured log plus optional store retention.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn CounterStore>,
    retention: Duration,
    persist: bool,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn CounterStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            retention: config.audit_retention(),
            persist: config.persist_audit,
        }
    }

    pub fn record(&self, record: AuditRecord) {
        tracing::info!(
            target: "audit",
            request_id = %record.request_id,
            method = %record.method,
            path = %record.path,
            client = %record.client_identity,
            user_agent = %record.user_agent,
            status = record.status_code,
            duration = record.duration,
            content_length = record.content_length,
            class = %record.limit_class,
            outcome = %record.outcome,
            "Request processed"
        );

        if !self.persist || !self.store.is_configured() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to serialize audit record");
                return;
            }
        };

        let key = record.store_key();
        let store = self.store.clone();
        let retention = self.retention;
        runtime.spawn(async move {
            if let Err(e) = store.put(&key, &payload, retention).await {
                tracing::debug!(error = %e, "Failed to persist audit record");
                metrics::record_audit_persist_failure();
            }
        });
    }
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("backend", &self.store.backend())
            .field("retention", &self.retention)
            .field("persist", &self.persist)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use axum::http::HeaderValue;

    fn snapshot() -> RequestSnapshot {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        RequestSnapshot::capture(&Method::POST, &"/auth/login?next=/".parse().unwrap(), &headers, None)
    }

    #[test]
    fn test_snapshot_capture() {
        let s = snapshot();
        assert_eq!(s.request_id, "req-1");
        assert_eq!(s.path, "/auth/login");
        assert_eq!(s.identity.as_str(), "203.0.113.9");
        assert_eq!(s.user_agent, "curl/8.0");
        assert_eq!(s.class, LimitClass::Auth);
    }

    #[test]
    fn test_snapshot_generates_request_id() {
        let s = RequestSnapshot::capture(&Method::GET, &"/".parse().unwrap(), &HeaderMap::new(), None);
        assert!(uuid::Uuid::parse_str(&s.request_id).is_ok());
        assert_eq!(s.identity.as_str(), "unknown");
    }

    #[test]
    fn test_record_serialization() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        let record = AuditRecord::new(
            &snapshot(),
            StatusCode::TOO_MANY_REQUESTS,
            &headers,
            Duration::from_micros(12_345),
            Outcome::RejectedByRateLimit,
        );

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["status_code"], 429);
        assert_eq!(json["duration"], 0.012);
        assert_eq!(json["content_length"], 42);
        assert_eq!(json["limit_class"], "auth");
        assert_eq!(json["outcome"], "rejected_by_rate_limit");
        assert!(record.store_key().starts_with("request_log:"));
        assert!(json.get("entry_id").is_none());
    }

    #[test]
    fn test_repeated_request_id_gets_distinct_keys() {
        let make = || {
            AuditRecord::new(
                &snapshot(),
                StatusCode::OK,
                &HeaderMap::new(),
                Duration::ZERO,
                Outcome::Admitted,
            )
        };
        let (first, second) = (make(), make());
        assert_eq!(first.request_id, second.request_id);
        assert_ne!(first.store_key(), second.store_key());
        assert!(!first.store_key().contains("req-1"));
    }

    #[tokio::test]
    async fn test_record_persists_to_store() {
        let store = Arc::new(InMemoryStore::new());
        let logger = AuditLogger::new(store.clone(), &StoreConfig::default());
        let record = AuditRecord::new(
            &snapshot(),
            StatusCode::OK,
            &HeaderMap::new(),
            Duration::ZERO,
            Outcome::Admitted,
        );
        let key = record.store_key();
        logger.record(record);

        for _ in 0..50 {
            if store.value(&key).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stored: serde_json::Value = serde_json::from_str(&store.value(&key).unwrap()).unwrap();
        assert_eq!(stored["client_identity"], "203.0.113.9");
    }

    #[test]
    fn test_record_outside_runtime_does_not_panic() {
        let logger = AuditLogger::new(Arc::new(InMemoryStore::new()), &StoreConfig::default());
        logger.record(AuditRecord::new(
            &snapshot(),
            StatusCode::OK,
            &HeaderMap::new(),
            Duration::ZERO,
            Outcome::Admitted,
        ));
    }
}
