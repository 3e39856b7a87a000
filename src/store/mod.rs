//! Shared counter store subsystem.
//!
//! # Data Flow
//! ```text
//! InflightCounter
//!     → resilience::retries (bounded retries, backoff)
//!     → CounterStore (atomic INCRBY / DECRBY / EXPIRE / GET)
//!         → redis.rs  (bb8 pool, production)
//!         → memory.rs (DashMap, single process and tests)
//! ```
//!
//! # Design Decisions
//! - Arithmetic happens inside the store, never read-modify-write in the caller
//! - Every store error is classified transient or non-transient up front
//! - A missing key reads as zero

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors returned by a [`CounterStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Connection could not be established or was dropped.
    #[error("store connection error: {0}")]
    Connection(String),

    /// Command did not complete within its deadline.
    #[error("store command timed out after {0}ms")]
    Timeout(u64),

    /// Any other error reported by the store.
    #[error("store error: {0}")]
    Backend(String),

    /// Key is malformed.
    #[error("invalid counter key: {0}")]
    InvalidKey(String),

    /// Store rejected our credentials.
    #[error("store authentication failed: {0}")]
    Auth(String),

    /// Value under the key is not an integer.
    #[error("counter value is not an integer: {0}")]
    Type(String),

    /// Client-side store settings are unusable (bad URL, unsupported scheme).
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_) | StoreError::Timeout(_) | StoreError::Backend(_)
        )
    }
}

/// Remaining lifetime of a key, mirroring the Redis `TTL` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "secs", rename_all = "snake_case")]
pub enum KeyTtl {
    /// Key does not exist (`-2`).
    Missing,
    /// Key exists without an expiry (`-1`).
    Persistent,
    /// Key expires after the given number of seconds.
    Expires(u64),
}

impl KeyTtl {
    /// Decode a raw Redis `TTL` reply.
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -2 => KeyTtl::Missing,
            r if r < 0 => KeyTtl::Persistent,
            r => KeyTtl::Expires(r as u64),
        }
    }
}

/// A shared key-value store that supports atomic integer counters with TTL.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add `delta` and return the new value. Creates the key at 0.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Atomically subtract `delta` and return the new value.
    async fn decr(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Set the key's time to live. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// Overwrite the value. Clears any existing expiry.
    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// List every live key starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
