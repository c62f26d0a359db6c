//! Contract for the remote primary cache tier.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrimaryCacheError {
    #[error("primary cache connection failed: {0}")]
    Connection(String),
    #[error("primary cache command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
    #[error("primary cache call `{0}` timed out")]
    Timeout(&'static str),
}

impl PrimaryCacheError {
    pub fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

/// Remote key/value store with TTL support. Every call may fail.
#[async_trait]
pub trait PrimaryCache: Send + Sync {
    /// Short backend name reported by cache stats.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), PrimaryCacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, PrimaryCacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PrimaryCacheError>;

    async fn delete(&self, key: &str) -> Result<(), PrimaryCacheError>;

    /// Keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, PrimaryCacheError>;

    /// Returns the number of keys actually removed.
    async fn delete_many(&self, keys: &[String]) -> Result<usize, PrimaryCacheError>;
}
