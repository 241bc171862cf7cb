//! Redis implementation of [`KvBackend`].

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

use super::backend::{KvBackend, KvError};

/// Per-operation budget; a stalled store must not stall authentication.
const OP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the store answers a `PING`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the store is
    /// unreachable.
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client =
            redis::Client::open(url).map_err(|err| KvError::Unreachable(err.to_string()))?;
        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|err| KvError::Unreachable(err.to_string()))?;

        let pong: String = timed(redis::cmd("PING").query_async(&mut manager)).await?;
        debug!("redis ping: {pong}");

        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

async fn timed<T>(
    fut: impl Future<Output = Result<T, redis::RedisError>> + Send,
) -> Result<T, KvError> {
    match tokio::time::timeout(OP_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(KvError::Operation(err.to_string())),
        Err(_) => Err(KvError::Timeout),
    }
}

#[async_trait]
impl KvBackend for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut con = self.connection();
        timed(con.get(key)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut con = self.connection();
        let seconds = ttl.as_secs().max(1);
        timed(con.set_ex(key, value, seconds)).await
    }

    async fn fetch_and_delete(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut con = self.connection();
        timed(con.get_del(key)).await
    }

    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        let mut con = self.connection();
        timed(con.incr(key, 1)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut con = self.connection();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        let _: bool = timed(con.expire(key, seconds)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut con = self.connection();
        let _: i64 = timed(con.del(key)).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut con = self.connection();
        timed(con.exists(key)).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let mut con = self.connection();
        let seconds: i64 = timed(con.ttl(key)).await?;
        // -2: no key, -1: no TTL.
        if seconds < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_secs(seconds.unsigned_abs())))
    }
}
