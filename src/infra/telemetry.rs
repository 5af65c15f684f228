use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

/// Registers units and help text for every cache metric.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "showroom_cache_hit_total",
            Unit::Count,
            "Reads served from a fresh or stale cache entry."
        );
        describe_counter!(
            "showroom_cache_miss_total",
            Unit::Count,
            "Reads that had to compute the response synchronously."
        );
        describe_counter!(
            "showroom_cache_not_modified_total",
            Unit::Count,
            "Conditional reads answered with 304 Not Modified."
        );
        describe_counter!(
            "showroom_cache_refresh_total",
            Unit::Count,
            "Background refresh attempts, labelled by outcome."
        );
        describe_histogram!(
            "showroom_cache_refresh_ms",
            Unit::Milliseconds,
            "Background refresh latency in milliseconds."
        );
        describe_counter!(
            "showroom_cache_store_error_total",
            Unit::Count,
            "Cache store failures, labelled by operation."
        );
        describe_counter!(
            "showroom_cache_evict_total",
            Unit::Count,
            "Entries evicted from the memory store due to capacity."
        );
        describe_counter!(
            "showroom_cache_flush_total",
            Unit::Count,
            "Full cache flushes, labelled by reason."
        );
        describe_histogram!(
            "showroom_cache_invalidate_ms",
            Unit::Milliseconds,
            "Invalidation latency in milliseconds."
        );
    });
}
