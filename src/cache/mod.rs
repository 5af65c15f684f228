//! Showroom response cache.
//!
//! Sits in front of the catalog's read endpoints:
//!
//! - **Keys**: deterministic fingerprint of namespace + normalized params
//! - **Conditional requests**: `If-None-Match` against the stored ETag
//! - **Stale-while-revalidate**: stale hits are served while one background
//!   refresh per key runs behind a refresh marker
//! - **Invalidation**: write paths call [`CacheTrigger`] after each commit
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! freshness_seconds = 60
//! stale_seconds = 120
//! refresh_lock_seconds = 5
//! refresh_timeout_seconds = 5
//! ```

mod clock;
mod codec;
mod conditional;
mod config;
mod consumer;
mod events;
mod freshness;
mod keys;
mod lock;
mod pipeline;
mod planner;
mod refresh;
mod source;
mod store;
#[cfg(test)]
mod testing;
mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CacheEntry, CodecError, HeaderValues, compute_etag};
pub use conditional::{Precondition, evaluate, if_none_match};
pub use config::CacheConfig;
pub use consumer::{CacheConsumer, ConsumeReport, FlushReason, InvalidationError};
pub use events::{CacheEvent, ChangeKind, Epoch, EpochCounter, EventKind};
pub use freshness::{Freshness, FreshnessPolicy, age_seconds, classify};
pub use keys::{
    CacheKey, ParamMap, build_key, canonical_query, detail_namespace, detail_prefix,
    listing_namespace, namespace_scope, normalize_params, params_from_query,
};
pub use pipeline::{CacheStatus, CachedReply, ResponseCache, X_CACHE, X_CACHE_KEY, X_QUERY_TIME_MS};
pub use planner::{InvalidationPlan, Scope, affected_scopes};
pub use refresh::{RefreshCoordinator, RefreshDecision, RefreshOutcome};
pub use source::{CacheRequest, ResponseSource, SourceError, SourceResponse};
pub use store::{CacheStore, MemoryStore, StoreError};
pub use trigger::CacheTrigger;
