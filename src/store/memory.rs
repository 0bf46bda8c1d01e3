//! In-process counter store.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{CounterStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A `DashMap`-backed store with TTL expiry on tokio's clock.
///
/// Counters are only shared within one process, so limits are per instance
/// when several gatekeepers run side by side.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys that have not yet expired.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|r| r.value().is_live(now))
            .map(|r| r.key().clone())
            .collect()
    }

    /// Raw value under a live key.
    pub fn value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    /// Entries held, expired or not.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Purge expired entries every `period` until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = store.entry_count(), "Purged expired entries");
                }
            }
        })
    }
}

fn deadline(now: Instant, ttl: Duration) -> Result<Instant, StoreError> {
    now.checked_add(ttl).ok_or(StoreError::TtlOutOfRange(ttl))
}

#[async_trait]
impl CounterStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.value(key) {
            Some(raw) => raw.parse().map(Some).map_err(|_| StoreError::NotACounter),
            None => Ok(None),
        }
    }

    async fn init_counter(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let expires_at = deadline(now, ttl)?;
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: String::new(),
            expires_at: now,
        });
        if entry.is_live(now) {
            return Ok(false);
        }
        *entry = Entry {
            value: "1".to_string(),
            expires_at,
        };
        Ok(true)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let now = Instant::now();
        let expires_at = deadline(now, ttl)?;
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: "0".to_string(),
                expires_at,
            };
        }
        let next = entry
            .value
            .parse::<i64>()
            .map_err(|_| StoreError::NotACounter)?
            + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = deadline(Instant::now(), ttl)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
