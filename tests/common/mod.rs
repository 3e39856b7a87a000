//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inflight_gate::admission::InflightGate;
use inflight_gate::config::{CounterConfig, QosConfig, RetryConfig};
use inflight_gate::counter::InflightCounter;
use inflight_gate::store::{CounterStore, KeyTtl, MemoryStore, StoreError};

/// Per-operation call counter and failure script.
#[derive(Default)]
pub struct OpScript {
    calls: AtomicU32,
    failures_left: AtomicU32,
    error: std::sync::Mutex<Option<StoreError>>,
}

impl OpScript {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fail the next `n` calls with `error`.
    pub fn fail_next(&self, n: u32, error: StoreError) {
        *self.error.lock().unwrap() = Some(error);
        self.failures_left.store(n, Ordering::SeqCst);
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            let error = self.error.lock().unwrap().clone();
            return Err(error.unwrap_or_else(|| StoreError::Connection("injected".into())));
        }
        Ok(())
    }
}

/// A [`MemoryStore`] with scriptable failures and call accounting.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub incr: OpScript,
    pub decr: OpScript,
    pub expire: OpScript,
    pub get: OpScript,
    /// When set, reads fail with a connection error.
    pub reads_down: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl CounterStore for FlakyStore {
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.incr.enter()?;
        self.inner.incr(key, delta).await
    }

    async fn decr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.decr.enter()?;
        self.inner.decr(key, delta).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.expire.enter()?;
        self.inner.expire(key, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.get.enter()?;
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("reads down".into()));
        }
        self.inner.get(key).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        self.inner.ttl(key).await
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(prefix).await
    }
}

/// Fast retry settings: 3 attempts, 1ms then 2ms.
pub fn retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        backoff_base_ms: 1,
        backoff_multiplier: 2.0,
        max_delay_ms: 10,
        jitter_ratio: 0.0,
    }
}

pub fn counter(store: Arc<dyn CounterStore>) -> InflightCounter {
    InflightCounter::new(store, &retry_config(), &CounterConfig::default())
}

pub fn gate(store: Arc<dyn CounterStore>, threshold: i64) -> InflightGate {
    InflightGate::new(
        counter(store),
        QosConfig {
            default_threshold: threshold,
            ..QosConfig::default()
        },
    )
}

/// Give background releases and TTL refreshes time to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
