//! Redis-backed counter store.
//!
//! # Responsibilities
//! - Hold an auto-reconnecting connection to the shared Redis instance
//! - Map the store contract onto `GET`, `SET NX EX`, `INCR` and `SET EX`
//! - Bound every call with the operation timeout
//!
//! # Design Decisions
//! - `INCR` runs inside a Lua script that re-applies the TTL when the key was
//!   recreated, so a key expiring between read and increment never becomes
//!   an immortal counter

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script, Value};

use super::{CounterStore, StoreError};

const INCR_WITH_TTL: &str = r"local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count";

/// Counter store talking to Redis.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    incr_script: Script,
    op_timeout: Duration,
}

impl RedisStore {
    /// Open a connection and verify it with `PING`, both within `connect_timeout`.
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        op_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "connect",
                after: connect_timeout,
            })??;

        let store = Self {
            conn,
            incr_script: Script::new(INCR_WITH_TTL),
            op_timeout,
        };
        store.ping().await?;
        Ok(store)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout {
                operation,
                after: self.op_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded("get", async move {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn init_counter(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Value = self
            .bounded("init_counter", async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(1)
                    .arg("EX")
                    .arg(ttl.as_secs().max(1))
                    .arg("NX")
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(!matches!(reply, Value::Nil))
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let script = &self.incr_script;
        self.bounded("incr", async move {
            script
                .key(key)
                .arg(ttl.as_secs().max(1))
                .invoke_async(&mut conn)
                .await
        })
        .await
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded("put", async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _pong: String = self
            .bounded("ping", async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        Ok(())
    }
}
