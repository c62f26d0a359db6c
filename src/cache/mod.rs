//! Socialfeed Cache System
//!
//! Cache-aside storage for the feed read paths:
//!
//! - **Primary**: a remote key/value store (Redis in production)
//! - **Local**: an in-process expiring store used whenever the primary is
//!   absent, failing or slow
//!
//! Writes never consult the cache; after they commit, [`CacheTrigger`]
//! clears the key families listed by the invalidation policy.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enable_primary = true
//! redis_url = "redis://127.0.0.1:6379/0"
//! primary_timeout_ms = 250
//! # ... see config.rs for all options
//! ```

mod config;
mod keys;
mod local;
mod lock;
mod policy;
mod primary;
mod tiered;
mod trigger;

pub use config::CacheConfig;
pub use keys::{ANONYMOUS_VIEWER, CacheKey, KeyPattern};
pub use local::{ExpiringLocalStore, LocalStoreStats};
pub use policy::{InvalidationPlan, Mutation};
pub use primary::{PrimaryCache, PrimaryCacheError};
pub use tiered::{CacheStats, PurgeReport, TieredCache};
pub use trigger::CacheTrigger;
