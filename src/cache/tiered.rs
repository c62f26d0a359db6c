//! Two-tier cache: remote primary with an in-process fallback.
//!
//! The primary is attempted on every call, each attempt guarded by the
//! configured timeout. Failures are logged and counted, never returned:
//! reads fall through to the local store, writes land there instead, and
//! deletes always clean the local store as well.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::local::{ExpiringLocalStore, LocalStoreStats};
use super::lock::{rw_read, rw_write};
use super::primary::{PrimaryCache, PrimaryCacheError};

const SOURCE: &str = "cache::tiered";
const LOCAL_BACKEND: &str = "memory";

const METRIC_HIT: &str = "socialfeed_cache_hit_total";
const METRIC_MISS: &str = "socialfeed_cache_miss_total";
const METRIC_PRIMARY_ERROR: &str = "socialfeed_cache_primary_error_total";
const METRIC_INVALIDATED: &str = "socialfeed_cache_invalidated_keys_total";

/// Operational snapshot of both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub primary_connected: bool,
    pub backend: &'static str,
    pub local: LocalStoreStats,
}

/// Outcome of a pattern delete across both tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub primary_deleted: usize,
    pub local_deleted: usize,
    pub primary_failed: bool,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.primary_deleted + self.local_deleted
    }
}

pub struct TieredCache {
    config: CacheConfig,
    primary: RwLock<Option<Arc<dyn PrimaryCache>>>,
    local: ExpiringLocalStore,
}

impl TieredCache {
    /// Starts in degraded mode; attach a primary with [`TieredCache::connect`].
    pub fn new(config: CacheConfig) -> Self {
        let local = ExpiringLocalStore::from_config(&config);
        Self {
            config,
            primary: RwLock::new(None),
            local,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn local(&self) -> &ExpiringLocalStore {
        &self.local
    }

    /// Attach `primary` if it answers a ping. Returns whether it was attached.
    pub async fn connect(&self, primary: Arc<dyn PrimaryCache>) -> bool {
        let backend = primary.backend();
        match self.guard("ping", primary.ping()).await {
            Ok(()) => {
                *rw_write(&self.primary, SOURCE, "connect") = Some(primary);
                info!(backend, "Primary cache connected");
                true
            }
            Err(err) => {
                warn!(
                    backend,
                    error = %err,
                    "Primary cache unreachable; serving from local store only"
                );
                false
            }
        }
    }

    pub fn disconnect(&self) {
        if rw_write(&self.primary, SOURCE, "disconnect").take().is_some() {
            info!("Primary cache disconnected");
        }
    }

    pub fn is_primary_connected(&self) -> bool {
        rw_read(&self.primary, SOURCE, "is_primary_connected").is_some()
    }

    fn primary(&self) -> Option<Arc<dyn PrimaryCache>> {
        rw_read(&self.primary, SOURCE, "primary").clone()
    }

    async fn guard<T, F>(&self, op: &'static str, call: F) -> Result<T, PrimaryCacheError>
    where
        F: Future<Output = Result<T, PrimaryCacheError>>,
    {
        match tokio::time::timeout(self.config.primary_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(PrimaryCacheError::Timeout(op)),
        }
    }

    fn primary_failed(&self, op: &'static str, key: &str, err: &PrimaryCacheError) {
        counter!(METRIC_PRIMARY_ERROR, "op" => op).increment(1);
        warn!(op, key, error = %err, "Primary cache call failed; using local store");
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(primary) = self.primary() {
            match self.guard("get", primary.get(key)).await {
                Ok(Some(value)) => {
                    counter!(METRIC_HIT, "tier" => "primary").increment(1);
                    return Some(value);
                }
                // A value may still sit locally from an earlier outage.
                Ok(None) => {}
                Err(err) => self.primary_failed("get", key, &err),
            }
        }

        match self.local.get(key) {
            Some(value) => {
                counter!(METRIC_HIT, "tier" => "local").increment(1);
                Some(value)
            }
            None => {
                counter!(METRIC_MISS).increment(1);
                None
            }
        }
    }

    /// Store in the primary, or locally if the primary is absent or failing.
    /// A key lives in one tier at a time: a primary write evicts the local copy.
    pub async fn set(&self, key: &str, value: String, ttl: Duration) {
        if let Some(primary) = self.primary() {
            match self.guard("set", primary.set(key, &value, ttl)).await {
                Ok(()) => {
                    self.local.delete(key);
                    return;
                }
                Err(err) => self.primary_failed("set", key, &err),
            }
        }

        self.local.set(key, value, ttl);
    }

    pub async fn delete(&self, key: &str) {
        if let Some(primary) = self.primary() {
            if let Err(err) = self.guard("delete", primary.delete(key)).await {
                self.primary_failed("delete", key, &err);
            }
        }
        self.local.delete(key);
    }

    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> PurgeReport {
        let mut report = PurgeReport::default();

        if let Some(primary) = self.primary() {
            match self.purge_primary(primary.as_ref(), pattern).await {
                Ok(deleted) => report.primary_deleted = deleted,
                Err(err) => {
                    report.primary_failed = true;
                    self.primary_failed("delete_pattern", pattern, &err);
                }
            }
        }

        report.local_deleted = self.local.delete_pattern(pattern);
        counter!(METRIC_INVALIDATED).increment(report.total() as u64);
        debug!(
            primary_deleted = report.primary_deleted,
            local_deleted = report.local_deleted,
            primary_failed = report.primary_failed,
            "Cache pattern purged"
        );
        report
    }

    async fn purge_primary(
        &self,
        primary: &dyn PrimaryCache,
        pattern: &str,
    ) -> Result<usize, PrimaryCacheError> {
        let keys = self.guard("keys", primary.keys(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.guard("delete_many", primary.delete_many(&keys)).await
    }

    /// Typed read; an undecodable payload counts as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        let raw = self.get(&key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "Discarding undecodable cache payload");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let key = key.to_string();
        match serde_json::to_string(value) {
            Ok(payload) => self.set(&key, payload, ttl).await,
            Err(err) => warn!(key = %key, error = %err, "Skipping cache write; payload not serializable"),
        }
    }

    /// Periodically purge expired local entries. `None` when the sweep is disabled.
    pub fn spawn_local_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.local_sweep_interval()?;
        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                interval.tick().await;
                let purged = cache.local.purge_expired();
                if purged > 0 {
                    debug!(purged, "Swept expired local cache entries");
                }
            }
        }))
    }

    pub fn stats(&self) -> CacheStats {
        let primary = self.primary();
        CacheStats {
            primary_connected: primary.is_some(),
            backend: primary
                .as_ref()
                .map(|primary| primary.backend())
                .unwrap_or(LOCAL_BACKEND),
            local: self.local.stats(),
        }
    }
}
