//! Redis-backed primary cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::cache::{PrimaryCache, PrimaryCacheError};

use super::error::InfraError;

#[derive(Clone)]
pub struct RedisPrimary {
    conn: ConnectionManager,
}

impl RedisPrimary {
    /// Open a managed connection. The manager reconnects on its own after drops.
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(url)
            .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;
        debug!("Redis connection manager ready");
        Ok(Self { conn })
    }
}

#[async_trait]
impl PrimaryCache for RedisPrimary {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), PrimaryCacheError> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| PrimaryCacheError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PrimaryCacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|err| PrimaryCacheError::command("GET", err))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PrimaryCacheError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(|err| PrimaryCacheError::command("SETEX", err))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PrimaryCacheError> {
        let mut conn = self.conn.clone();
        let _removed: usize = conn
            .del(key)
            .await
            .map_err(|err| PrimaryCacheError::command("DEL", err))?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, PrimaryCacheError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|err| PrimaryCacheError::command("KEYS", err))?;
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, PrimaryCacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: usize = conn
            .del(keys)
            .await
            .map_err(|err| PrimaryCacheError::command("DEL", err))?;
        Ok(removed)
    }
}
