//! Freshness classification.
//!
//! An entry is FRESH for `freshness_window` after it was written, then STALE
//! (served while one background refresh is attempted) for `stale_window`,
//! then EXPIRED and never served again.

use std::time::Duration;

use time::OffsetDateTime;

use super::codec::{CacheEntry, cache_control_value};

const STORE_TTL_MARGIN: Duration = Duration::from_secs(1);

/// Freshness windows applied to newly written entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub freshness_window: Duration,
    pub stale_window: Duration,
}

impl FreshnessPolicy {
    pub fn new(freshness_window: Duration, stale_window: Duration) -> Self {
        Self {
            freshness_window,
            stale_window,
        }
    }

    /// Store TTL for entries written under this policy.
    ///
    /// One second past the stale window, so an entry aged exactly
    /// `freshness + stale` is still in the store and `classify` decides.
    pub fn entry_ttl(&self) -> Duration {
        self.freshness_window + self.stale_window + STORE_TTL_MARGIN
    }

    pub fn cache_control(&self) -> String {
        cache_control_value(self.freshness_window.as_secs(), self.stale_window.as_secs())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl Freshness {
    pub fn is_servable(self) -> bool {
        !matches!(self, Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
        }
    }
}

/// Whole seconds since the entry was written. Clock skew clamps to zero.
pub fn age_seconds(entry: &CacheEntry, now: OffsetDateTime) -> u64 {
    u64::try_from((now - entry.cached_at).whole_seconds()).unwrap_or(0)
}

/// Classifies `entry` using the windows it was written with.
pub fn classify(entry: &CacheEntry, now: OffsetDateTime) -> Freshness {
    let age = age_seconds(entry, now);
    if age <= entry.max_age {
        Freshness::Fresh
    } else if age <= entry.max_age.saturating_add(entry.stale_while_revalidate) {
        Freshness::Stale
    } else {
        Freshness::Expired
    }
}
