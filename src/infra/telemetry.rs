use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // Logs go to stderr; stdout carries command output.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "socialfeed_cache_hit_total",
            Unit::Count,
            "Total number of cache hits, labelled by tier."
        );
        describe_counter!(
            "socialfeed_cache_miss_total",
            Unit::Count,
            "Total number of reads that missed both cache tiers."
        );
        describe_counter!(
            "socialfeed_cache_primary_error_total",
            Unit::Count,
            "Total number of failed or timed out primary cache calls, labelled by operation."
        );
        describe_counter!(
            "socialfeed_cache_local_evict_total",
            Unit::Count,
            "Total number of local cache evictions due to capacity."
        );
        describe_counter!(
            "socialfeed_cache_invalidated_keys_total",
            Unit::Count,
            "Total number of cache entries removed by pattern invalidation."
        );
    });
}
