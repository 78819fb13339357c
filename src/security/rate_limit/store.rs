//! Shared counter store used by the distributed limiter.
//!
//! # Responsibilities
//! - Atomic "increment, set TTL on first creation, return count"
//! - Script handle management (load once, reuse by SHA)
//! - Liveness check for readiness
//!
//! # Design Decisions
//! - The increment is a server-side Lua script, so INCR and EXPIRE cannot race
//! - Every round trip carries the same sub-second deadline
//! - Stale script handles are reported distinctly so the caller can reload once

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use crate::resilience::timeouts::with_deadline;

/// Increments `KEYS[1]`, setting its TTL to `ARGV[1]` seconds when it is new.
pub const WINDOW_SCRIPT: &str = r#"
local current = redis.call("INCR", KEYS[1])
if current == 1 then
  redis.call("EXPIRE", KEYS[1], tonumber(ARGV[1]))
end
return current
"#;

/// Failures talking to the counter store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// The store no longer knows the cached script handle.
    #[error("script handle is not loaded on the store")]
    NoScript,
    #[error("store error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.kind() == redis::ErrorKind::NoScriptError {
            StoreError::NoScript
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

/// A store able to run the fixed-window increment atomically.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Register `script` and return the handle used by [`CounterStore::eval_script`].
    async fn load_script(&self, script: &str) -> Result<String, StoreError>;

    /// Run a previously loaded script against `key` with a TTL argument.
    /// Returns [`StoreError::NoScript`] if the handle is unknown to the store.
    async fn eval_script(&self, handle: &str, key: &str, ttl_secs: u64)
        -> Result<i64, StoreError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Redis / Dragonfly implementation of [`CounterStore`].
pub struct RedisCounterStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisCounterStore {
    /// Create a store for `url`. No connection is made until first use.
    pub fn open(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        // A failed connect leaves the cell empty, so the next call tries again.
        let conn = self
            .connection
            .get_or_try_init(|| async {
                with_deadline(self.timeout, ConnectionManager::new(self.client.clone()))
                    .await
                    .map_err(|e| StoreError::Timeout(e.0))?
                    .map_err(StoreError::from)
            })
            .await?;
        Ok(conn.clone())
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, StoreError> {
        let timeout = self.timeout;
        with_deadline(timeout, async {
            let mut conn = self.connection().await?;
            let value: T = cmd.query_async(&mut conn).await?;
            Ok::<T, StoreError>(value)
        })
        .await
        .map_err(|e| StoreError::Timeout(e.0))?
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn load_script(&self, script: &str) -> Result<String, StoreError> {
        let mut cmd = redis::cmd("SCRIPT");
        cmd.arg("LOAD").arg(script);
        self.query(cmd).await
    }

    async fn eval_script(
        &self,
        handle: &str,
        key: &str,
        ttl_secs: u64,
    ) -> Result<i64, StoreError> {
        let mut cmd = redis::cmd("EVALSHA");
        cmd.arg(handle).arg(1).arg(key).arg(ttl_secs);
        self.query(cmd).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let reply: String = self.query(redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Backend(format!("unexpected PING reply: {reply}")))
        }
    }
}
