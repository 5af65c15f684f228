//! Response cache configuration, resolved from the `[cache]` settings table.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::freshness::FreshnessPolicy;

const DEFAULT_FRESHNESS_SECONDS: u64 = 60;
const DEFAULT_STALE_SECONDS: u64 = 120;
const DEFAULT_REFRESH_LOCK_SECONDS: u64 = 5;
const DEFAULT_REFRESH_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_STORE_CAPACITY: usize = 10_000;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every read goes straight to the response source.
    pub enabled: bool,
    pub freshness_window: Duration,
    pub stale_window: Duration,
    /// TTL of the refresh marker.
    pub refresh_lock_ttl: Duration,
    /// Upper bound on one background refresh. Never above `refresh_lock_ttl`.
    pub refresh_timeout: Duration,
    pub store_capacity: NonZeroUsize,
    /// Bodies larger than this are served but not stored.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            freshness_window: Duration::from_secs(DEFAULT_FRESHNESS_SECONDS),
            stale_window: Duration::from_secs(DEFAULT_STALE_SECONDS),
            refresh_lock_ttl: Duration::from_secs(DEFAULT_REFRESH_LOCK_SECONDS),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECONDS),
            store_capacity: NonZeroUsize::new(DEFAULT_STORE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            freshness_window: Duration::from_secs(u64::from(settings.freshness_seconds)),
            stale_window: Duration::from_secs(u64::from(settings.stale_seconds)),
            refresh_lock_ttl: Duration::from_secs(u64::from(settings.refresh_lock_seconds.get())),
            refresh_timeout: Duration::from_secs(u64::from(
                settings.refresh_timeout_seconds.get(),
            )),
            store_capacity: settings.store_capacity,
            max_body_bytes: settings.max_body_bytes.get() as usize,
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::new(self.freshness_window, self.stale_window)
    }
}
