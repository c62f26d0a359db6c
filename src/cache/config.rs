//! Cache configuration.
//!
//! Controls the Redis primary tier, the in-process fallback store and the
//! per-keyspace TTLs. Resolved from the `[cache]` settings table.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";
const DEFAULT_PRIMARY_TIMEOUT_MS: u64 = 250;
const DEFAULT_LOCAL_MAX_ENTRIES: usize = 10_000;
const DEFAULT_LOCAL_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_POST_TTL_SECS: u64 = 30 * 60;
const DEFAULT_POSTS_TTL_SECS: u64 = 15 * 60;
const DEFAULT_USER_POSTS_TTL_SECS: u64 = 10 * 60;
const DEFAULT_RECOMMENDATIONS_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Attach the Redis primary tier at startup.
    pub enable_primary: bool,
    /// Redis connection URL.
    pub redis_url: String,
    /// Upper bound for any single primary call before falling back.
    pub primary_timeout_ms: u64,
    /// Capacity of the in-process fallback store.
    pub local_max_entries: usize,
    /// Interval of the background expiry sweep; zero disables it.
    pub local_sweep_interval_secs: u64,
    pub post_ttl_secs: u64,
    pub posts_ttl_secs: u64,
    pub user_posts_ttl_secs: u64,
    pub recommendations_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_primary: true,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            primary_timeout_ms: DEFAULT_PRIMARY_TIMEOUT_MS,
            local_max_entries: DEFAULT_LOCAL_MAX_ENTRIES,
            local_sweep_interval_secs: DEFAULT_LOCAL_SWEEP_INTERVAL_SECS,
            post_ttl_secs: DEFAULT_POST_TTL_SECS,
            posts_ttl_secs: DEFAULT_POSTS_TTL_SECS,
            user_posts_ttl_secs: DEFAULT_USER_POSTS_TTL_SECS,
            recommendations_ttl_secs: DEFAULT_RECOMMENDATIONS_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enable_primary: settings.enable_primary,
            redis_url: settings.redis_url.clone(),
            primary_timeout_ms: settings.primary_timeout.as_millis() as u64,
            local_max_entries: settings.local_max_entries.get(),
            local_sweep_interval_secs: settings
                .local_sweep_interval
                .map(|interval| interval.as_secs())
                .unwrap_or(0),
            post_ttl_secs: settings.post_ttl.as_secs(),
            posts_ttl_secs: settings.posts_ttl.as_secs(),
            user_posts_ttl_secs: settings.user_posts_ttl.as_secs(),
            recommendations_ttl_secs: settings.recommendations_ttl.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms.max(1))
    }

    /// Returns the local capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn local_max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.local_max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn local_sweep_interval(&self) -> Option<Duration> {
        (self.local_sweep_interval_secs > 0)
            .then(|| Duration::from_secs(self.local_sweep_interval_secs))
    }

    pub fn post_ttl(&self) -> Duration {
        Duration::from_secs(self.post_ttl_secs)
    }

    pub fn posts_ttl(&self) -> Duration {
        Duration::from_secs(self.posts_ttl_secs)
    }

    pub fn user_posts_ttl(&self) -> Duration {
        Duration::from_secs(self.user_posts_ttl_secs)
    }

    pub fn recommendations_ttl(&self) -> Duration {
        Duration::from_secs(self.recommendations_ttl_secs)
    }
}
