//! Redis-backed counter store.
//!
//! # Responsibilities
//! - Own a bb8 connection pool to the shared Redis instance
//! - Bound every command with a deadline
//! - Translate `RedisError` into the [`StoreError`] taxonomy

use std::time::Duration;

use ::redis::{AsyncCommands, ErrorKind, RedisError};
use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;

use crate::config::StoreConfig;
use crate::store::{CounterStore, KeyTtl, StoreError};

/// Counter store talking to Redis through a connection pool.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool<RedisConnectionManager>,
    command_timeout: Duration,
}

impl RedisStore {
    /// Build the pool and verify connectivity with a `PING`.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let command_timeout = Duration::from_millis(config.command_timeout_ms);
        let manager = RedisConnectionManager::new(config.url.as_str())
            .map_err(|e| classify(e, command_timeout))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .await
            .map_err(|e| classify(e, command_timeout))?;

        let store = Self {
            pool,
            command_timeout,
        };

        store
            .with_timeout(async {
                let mut conn = store.conn().await?;
                let _: String = ::redis::cmd("PING")
                    .query_async(&mut *conn)
                    .await
                    .map_err(|e| store.fail(e))?;
                Ok(())
            })
            .await?;

        tracing::info!(
            pool_size = config.pool_size,
            command_timeout_ms = config.command_timeout_ms,
            "Redis counter store connected"
        );

        Ok(store)
    }

    /// Current pool usage (connections, idle connections).
    pub fn pool_state(&self) -> bb8::State {
        self.pool.state()
    }

    async fn conn(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, StoreError> {
        self.pool.get().await.map_err(|e| match e {
            bb8::RunError::User(e) => self.fail(e),
            bb8::RunError::TimedOut => {
                StoreError::Connection("timed out waiting for a pooled connection".to_string())
            }
        })
    }

    fn fail(&self, err: RedisError) -> StoreError {
        classify(err, self.command_timeout)
    }

    async fn with_timeout<F, T>(&self, op: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.command_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.command_timeout.as_millis() as u64))?
    }
}

/// Map a Redis error onto the retry taxonomy. `deadline` is reported for
/// client-side timeouts.
pub(crate) fn classify(err: RedisError, deadline: Duration) -> StoreError {
    if err.is_timeout() {
        return StoreError::Timeout(deadline.as_millis() as u64);
    }
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        return StoreError::Connection(err.to_string());
    }
    match err.kind() {
        ErrorKind::AuthenticationFailed => StoreError::Auth(err.to_string()),
        ErrorKind::TypeError => StoreError::Type(err.to_string()),
        ErrorKind::InvalidClientConfig => StoreError::Config(err.to_string()),
        ErrorKind::ResponseError
            if err.code() == Some("ERR")
                && err.to_string().contains("not an integer") =>
        {
            StoreError::Type(err.to_string())
        }
        ErrorKind::ResponseError if err.code() == Some("WRONGTYPE") => {
            StoreError::Type(err.to_string())
        }
        ErrorKind::ResponseError
            if matches!(err.code(), Some("NOAUTH") | Some("WRONGPASS") | Some("NOPERM")) =>
        {
            StoreError::Auth(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.incr::<_, _, i64>(key, delta).await.map_err(|e| self.fail(e))
        })
        .await
    }

    async fn decr(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.decr::<_, _, i64>(key, delta).await.map_err(|e| self.fail(e))
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.expire::<_, bool>(key, ttl.as_secs() as i64)
                .await
                .map_err(|e| self.fail(e))
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.get::<_, Option<i64>>(key).await.map_err(|e| self.fail(e))
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let reply: i64 = conn.ttl(key).await.map_err(|e| self.fail(e))?;
            Ok(KeyTtl::from_reply(reply))
        })
        .await
    }

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.set::<_, _, ()>(key, value).await.map_err(|e| self.fail(e))
        })
        .await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // KEYS is O(n) over the keyspace; only the admin surface calls this.
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.keys::<_, Vec<String>>(format!("{}*", prefix))
                .await
                .map_err(|e| self.fail(e))
        })
        .await
    }
}
