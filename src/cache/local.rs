//! In-process expiring key/value store.
//!
//! Serves as the fallback tier while the primary cache is unreachable and as
//! the only tier when no primary is attached. Expiry is lazy: an entry past
//! its deadline is purged by the read that finds it. `purge_expired` exists
//! for the optional background sweep.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::local";
const METRIC_LOCAL_EVICT: &str = "socialfeed_cache_local_evict_total";
/// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct LocalEntry {
    value: String,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalStoreStats {
    pub entry_count: usize,
    pub keys: Vec<String>,
}

/// Bounded map of key to (value, deadline) under a single mutex.
pub struct ExpiringLocalStore {
    entries: Mutex<LruCache<String, LocalEntry>>,
}

impl ExpiringLocalStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.local_max_entries_non_zero())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        entries.pop(key);
        debug!(key, "Expired local cache entry purged on read");
        None
    }

    pub fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let entry = LocalEntry { value, expires_at };

        let evicted = mutex_lock(&self.entries, SOURCE, "set").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                counter!(METRIC_LOCAL_EVICT).increment(1);
                debug!(key = %evicted_key, "Local cache entry evicted at capacity");
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        mutex_lock(&self.entries, SOURCE, "delete")
            .pop(key)
            .is_some()
    }

    /// Remove every key containing `pattern` with its `*` characters stripped.
    ///
    /// This is substring containment, not glob matching: `posts:*` matches
    /// `user_posts:1:0:10` as well. More than one wildcard is unsupported and
    /// treated the same way.
    pub fn delete_pattern(&self, pattern: &str) -> usize {
        if pattern.matches('*').count() > 1 {
            warn!(
                pattern,
                "Local cache pattern has multiple wildcards; matching by substring"
            );
        }
        let needle = pattern.replace('*', "");

        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_pattern");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.contains(needle.as_str()))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key.as_str());
        }
        doomed.len()
    }

    /// Drop every entry past its deadline.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "purge_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key.as_str());
        }
        expired.len()
    }

    /// Live entries only; expired ones are purged first.
    pub fn stats(&self) -> LocalStoreStats {
        self.purge_expired();
        let entries = mutex_lock(&self.entries, SOURCE, "stats");
        let mut keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        keys.sort();
        LocalStoreStats {
            entry_count: keys.len(),
            keys,
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
