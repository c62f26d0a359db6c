//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "socialfeed";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Command-line arguments for the socialfeed binary.
#[derive(Debug, Parser)]
#[command(name = "socialfeed", version, about = "Social feed backend tooling")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SOCIALFEED_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
    /// Print cache tier status and local entries.
    #[command(name = "cache-stats")]
    CacheStats(CacheStatsArgs),
    /// Remove cache entries matching a glob pattern from both tiers.
    #[command(name = "cache-purge")]
    CachePurge(CachePurgeArgs),
    /// List active posts through the cached reader.
    Posts(PostsArgs),
    /// Compute recommendations for a user.
    Recommend(RecommendArgs),
}

/// Overrides shared by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Run with the local cache tier only.
    #[arg(long = "no-primary-cache", action = clap::ArgAction::SetTrue)]
    pub no_primary_cache: bool,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheStatsArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct CachePurgeArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Glob pattern, e.g. `posts:*` or `post:42:*`.
    #[arg(value_name = "PATTERN")]
    pub pattern: String,
}

#[derive(Debug, Args, Clone)]
pub struct PostsArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[arg(long, default_value_t = 0)]
    pub skip: u32,

    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Only posts by this author.
    #[arg(long, value_name = "USER_ID")]
    pub author: Option<i64>,

    /// Only posts in this category.
    #[arg(long, value_name = "CATEGORY_ID")]
    pub category: Option<i64>,

    /// Resolve like/save flags for this user.
    #[arg(long, value_name = "USER_ID")]
    pub viewer: Option<i64>,
}

#[derive(Debug, Args, Clone)]
pub struct RecommendArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    #[arg(long, value_name = "USER_ID")]
    pub user: i64,

    #[arg(long, default_value_t = 10)]
    pub limit: u32,
}

impl Command {
    pub fn overrides(&self) -> &CommonOverrides {
        match self {
            Command::Migrate(args) => &args.overrides,
            Command::CacheStats(args) => &args.overrides,
            Command::CachePurge(args) => &args.overrides,
            Command::Posts(args) => &args.overrides,
            Command::Recommend(args) => &args.overrides,
        }
    }
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enable_primary: bool,
    pub redis_url: String,
    pub primary_timeout: Duration,
    pub local_max_entries: NonZeroUsize,
    /// `None` disables the background sweep.
    pub local_sweep_interval: Option<Duration>,
    pub post_ttl: Duration,
    pub posts_ttl: Duration,
    pub user_posts_ttl: Duration,
    pub recommendations_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SOCIALFEED").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if overrides.no_primary_cache {
            self.cache.enable_primary = Some(false);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            database: build_database_settings(raw.database)?,
            cache: build_cache_settings(raw.cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections)
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let redis_url = cache
        .redis_url
        .map(|value| value.trim().to_string())
        .unwrap_or(defaults.redis_url);
    if redis_url.is_empty() {
        return Err(LoadError::invalid("cache.redis_url", "must not be empty"));
    }

    let timeout_ms = cache
        .primary_timeout_ms
        .unwrap_or(defaults.primary_timeout_ms);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.primary_timeout_ms",
            "must be greater than zero",
        ));
    }

    let local_max_entries = cache
        .local_max_entries
        .unwrap_or(defaults.local_max_entries);
    let local_max_entries = NonZeroUsize::new(local_max_entries).ok_or_else(|| {
        LoadError::invalid("cache.local_max_entries", "must be greater than zero")
    })?;

    let sweep_seconds = cache
        .local_sweep_interval_seconds
        .unwrap_or(defaults.local_sweep_interval_secs);

    Ok(CacheSettings {
        enable_primary: cache.enable_primary.unwrap_or(defaults.enable_primary),
        redis_url,
        primary_timeout: Duration::from_millis(timeout_ms),
        local_max_entries,
        local_sweep_interval: (sweep_seconds > 0).then(|| Duration::from_secs(sweep_seconds)),
        post_ttl: ttl(
            cache.post_ttl_seconds,
            defaults.post_ttl_secs,
            "cache.post_ttl_seconds",
        )?,
        posts_ttl: ttl(
            cache.posts_ttl_seconds,
            defaults.posts_ttl_secs,
            "cache.posts_ttl_seconds",
        )?,
        user_posts_ttl: ttl(
            cache.user_posts_ttl_seconds,
            defaults.user_posts_ttl_secs,
            "cache.user_posts_ttl_seconds",
        )?,
        recommendations_ttl: ttl(
            cache.recommendations_ttl_seconds,
            defaults.recommendations_ttl_secs,
            "cache.recommendations_ttl_seconds",
        )?,
    })
}

/// One year; cache entries never need to outlive that.
const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

fn ttl(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        seconds if seconds > MAX_TTL_SECONDS => Err(LoadError::invalid(
            key,
            format!("must be at most {MAX_TTL_SECONDS} seconds"),
        )),
        seconds => Ok(Duration::from_secs(seconds)),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enable_primary: Option<bool>,
    redis_url: Option<String>,
    primary_timeout_ms: Option<u64>,
    local_max_entries: Option<usize>,
    local_sweep_interval_seconds: Option<u64>,
    post_ttl_seconds: Option<u64>,
    posts_ttl_seconds: Option<u64>,
    user_posts_ttl_seconds: Option<u64>,
    recommendations_ttl_seconds: Option<u64>,
}
