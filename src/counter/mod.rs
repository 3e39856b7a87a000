//! Inflight counter subsystem.
//!
//! # Data Flow
//! ```text
//! increment(key)
//!     → RetryPolicy::run_or_raise(INCRBY 1)   caller learns whether the count moved
//!     → background: refresh_expiry(key, ttl)  logged on failure, never blocks
//!
//! decrement(key)
//!     → RetryPolicy::run(DECRBY 1)            best effort, never an error
//! ```
//!
//! # Design Decisions
//! - Store-side atomic arithmetic; no cached or read-modify-write counts
//! - Every successful increment renews the TTL, so a crashed holder's count
//!   expires instead of leaking
//! - A missing key is a count of zero

pub mod key;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{CounterConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::{Outcome, RetryPolicy};
use crate::store::{CounterStore, KeyTtl, StoreError};

pub use key::CounterKey;

/// Point-in-time view of one counter, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub key: CounterKey,
    pub provider: String,
    pub value: i64,
    pub ttl: KeyTtl,
}

/// Per-provider inflight counter over a shared store.
#[derive(Clone)]
pub struct InflightCounter {
    store: Arc<dyn CounterStore>,
    retry: RetryPolicy,
    ttl: Duration,
    namespace: String,
}

impl fmt::Debug for InflightCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflightCounter")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .field("store", &"<store>")
            .finish()
    }
}

impl InflightCounter {
    pub fn new(store: Arc<dyn CounterStore>, retry: &RetryConfig, counter: &CounterConfig) -> Self {
        Self {
            store,
            retry: RetryPolicy::new(retry),
            ttl: Duration::from_secs(counter.ttl_secs),
            namespace: counter.namespace.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key of `provider`'s counter in this counter's namespace.
    pub fn key_for(&self, provider: &str) -> Result<CounterKey, StoreError> {
        CounterKey::new(&self.namespace, provider)
    }

    /// Atomically add one.
    ///
    /// Returns `Ok` only if the store confirmed the increment. On success the
    /// key's TTL is renewed on a background task.
    pub async fn increment(&self, key: &CounterKey) -> Result<i64, StoreError> {
        let value = self
            .retry
            .run_or_raise("incr", key.as_str(), || self.store.incr(key.as_str(), 1))
            .await?;

        tracing::debug!(key = %key, value, "Inflight counter incremented");
        metrics::record_inflight_value(key.provider(), value);
        self.spawn_expiry_refresh(key.clone());

        Ok(value)
    }

    /// Atomically subtract one, best effort. Never fails.
    ///
    /// A rejected or exhausted decrement is logged here and reported as
    /// `Exhausted`; the slot is left for the TTL to reclaim.
    pub async fn decrement(&self, key: &CounterKey) -> Outcome<i64> {
        let outcome = self
            .retry
            .run("decr", key.as_str(), || self.store.decr(key.as_str(), 1))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(key = %key, error = %e, "Inflight counter decrement rejected");
                Outcome::Exhausted {
                    attempts: 1,
                    last_error: e,
                }
            });

        match &outcome {
            Outcome::Success(value) => {
                tracing::debug!(key = %key, value, "Inflight counter decremented");
                metrics::record_inflight_value(key.provider(), *value);
                if *value < 0 {
                    tracing::warn!(key = %key, value, "Inflight counter went negative");
                }
            }
            Outcome::Exhausted { attempts, last_error } => {
                tracing::error!(
                    key = %key,
                    attempts,
                    error = %last_error,
                    "Inflight counter decrement lost, TTL will reclaim it"
                );
            }
        }

        outcome
    }

    /// Set or renew the key's TTL. `Success(false)` means the key was absent.
    pub async fn refresh_expiry(&self, key: &CounterKey, ttl: Duration) -> Result<Outcome<bool>, StoreError> {
        self.retry
            .run("expire", key.as_str(), || self.store.expire(key.as_str(), ttl))
            .await
    }

    fn spawn_expiry_refresh(&self, key: CounterKey) {
        let counter = self.clone();
        tokio::spawn(async move {
            match counter.refresh_expiry(&key, counter.ttl).await {
                Ok(Outcome::Success(true)) => {
                    tracing::trace!(key = %key, ttl_secs = counter.ttl.as_secs(), "Inflight TTL renewed");
                }
                Ok(Outcome::Success(false)) => {
                    tracing::warn!(key = %key, "Inflight key vanished before its TTL could be set");
                }
                Ok(Outcome::Exhausted { last_error, .. }) | Err(last_error) => {
                    tracing::warn!(key = %key, error = %last_error, "Failed to renew inflight TTL");
                    metrics::record_ttl_refresh_failure();
                }
            }
        });
    }

    /// Current count, single attempt. A missing key is zero.
    pub async fn current(&self, key: &CounterKey) -> Result<i64, StoreError> {
        Ok(self.store.get(key.as_str()).await?.unwrap_or(0))
    }

    pub async fn key_ttl(&self, key: &CounterKey) -> Result<KeyTtl, StoreError> {
        self.store.ttl(key.as_str()).await
    }

    /// Force the count back to zero and re-arm the TTL. Operator remediation only.
    pub async fn reset(&self, key: &CounterKey) -> Result<CounterSnapshot, StoreError> {
        let previous = self.current(key).await?;
        self.retry
            .run_or_raise("set", key.as_str(), || self.store.set(key.as_str(), 0))
            .await?;
        self.retry
            .run_or_raise("expire", key.as_str(), || self.store.expire(key.as_str(), self.ttl))
            .await?;

        tracing::warn!(key = %key, previous, "Inflight counter reset by operator");
        metrics::record_inflight_value(key.provider(), 0);

        self.snapshot(key).await
    }

    pub async fn snapshot(&self, key: &CounterKey) -> Result<CounterSnapshot, StoreError> {
        let value = self.current(key).await?;
        let ttl = self.key_ttl(key).await?;
        Ok(CounterSnapshot {
            provider: key.provider().to_string(),
            key: key.clone(),
            value,
            ttl,
        })
    }

    /// Snapshot every counter in this namespace.
    pub async fn list(&self) -> Result<Vec<CounterSnapshot>, StoreError> {
        let prefix = CounterKey::prefix(&self.namespace)?;
        let mut snapshots = Vec::new();
        for raw in self.store.keys(&prefix).await? {
            let key = match CounterKey::parse(&raw) {
                Ok(key) => key,
                Err(e) => {
                    tracing::debug!(key = %raw, error = %e, "Skipping foreign key");
                    continue;
                }
            };
            snapshots.push(self.snapshot(&key).await?);
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn counter(store: Arc<MemoryStore>) -> InflightCounter {
        InflightCounter::new(store, &RetryConfig::default(), &CounterConfig::default())
    }

    #[tokio::test]
    async fn test_increment_then_decrement() {
        let store = Arc::new(MemoryStore::new());
        let counter = counter(store.clone());
        let key = counter.key_for("p1").unwrap();

        assert_eq!(counter.increment(&key).await.unwrap(), 1);
        assert_eq!(counter.increment(&key).await.unwrap(), 2);
        assert_eq!(counter.decrement(&key).await, Outcome::Success(1));
        assert_eq!(counter.current(&key).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_zero() {
        let counter = counter(Arc::new(MemoryStore::new()));
        let key = counter.key_for("never-used").unwrap();
        assert_eq!(counter.current(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_arms_ttl() {
        let store = Arc::new(MemoryStore::new());
        let counter = counter(store.clone());
        let key = counter.key_for("p1").unwrap();

        counter.increment(&key).await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(counter.key_ttl(&key).await.unwrap(), KeyTtl::Expires(300));
    }

    #[tokio::test]
    async fn test_reset_and_list() {
        let store = Arc::new(MemoryStore::new());
        let counter = counter(store.clone());
        let a = counter.key_for("a").unwrap();
        let b = counter.key_for("b").unwrap();

        for _ in 0..3 {
            counter.increment(&a).await.unwrap();
        }
        counter.increment(&b).await.unwrap();
        store.set("elsewhere:inflight:a", 9).await.unwrap();

        let snap = counter.reset(&a).await.unwrap();
        assert_eq!(snap.value, 0);
        assert_eq!(snap.ttl, KeyTtl::Expires(300));

        let listed = counter.list().await.unwrap();
        let values: Vec<_> = listed.iter().map(|s| (s.provider.as_str(), s.value)).collect();
        assert_eq!(values, vec![("a", 0), ("b", 1)]);
    }
}
