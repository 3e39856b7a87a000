//! In-process counter store.
//!
//! Backs single-instance deployments and tests. Expiry is measured on the
//! tokio clock so paused-time tests can advance past a TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::store::{CounterStore, KeyTtl, StoreError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// A thread-safe counter store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_key(key: &str) -> Result<(), StoreError> {
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn add(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        Self::check_key(key)?;
        let now = Instant::now();
        let mut entry = self.inner.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: 0,
                expires_at: None,
            };
        }
        entry.value = entry
            .value
            .checked_add(delta)
            .ok_or_else(|| StoreError::Type(format!("increment would overflow `{}`", key)))?;
        Ok(entry.value)
    }

    /// Look up a live entry, evicting it if it has expired.
    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        let entry = self.inner.get(key).map(|r| *r.value())?;
        if entry.is_live(now) {
            Some(entry)
        } else {
            self.inner.remove_if(key, |_, e| !e.is_live(now));
            None
        }
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.add(key, delta)
    }

    async fn decr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.add(key, -delta)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        Self::check_key(key)?;
        let now = Instant::now();
        match self.inner.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Self::check_key(key)?;
        Ok(self.live(key).map(|e| e.value))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        Self::check_key(key)?;
        let ttl = match self.live(key) {
            None => KeyTtl::Missing,
            Some(Entry { expires_at: None, .. }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(round_secs(at.saturating_duration_since(Instant::now()))),
        };
        Ok(ttl)
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        Self::check_key(key)?;
        self.inner.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .inner
            .iter()
            .filter(|r| r.key().starts_with(prefix) && r.value().is_live(now))
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Whole seconds, rounded to nearest like Redis `TTL`.
fn round_secs(remaining: Duration) -> u64 {
    ((remaining.as_millis() + 500) / 1000) as u64
}
