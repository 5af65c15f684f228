//! Background refresh of stale entries.
//!
//! A stale hit asks the coordinator to refresh its key. The coordinator
//! claims the key's refresh marker with an atomic set-if-absent; only the
//! claimant spawns a refresh. The refresh recomputes the response on its own
//! task, bounded by a timeout, writes it back only if its marker is still in
//! place, and then releases the marker whatever happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use bytes::Bytes;
use metrics::{counter, histogram};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::codec::CacheEntry;
use super::config::CacheConfig;
use super::freshness::FreshnessPolicy;
use super::keys::CacheKey;
use super::pipeline::{record_store_error, write_entry};
use super::source::{CacheRequest, ResponseSource};
use super::store::CacheStore;

const METRIC_CACHE_REFRESH_TOTAL: &str = "showroom_cache_refresh_total";
const METRIC_CACHE_REFRESH_MS: &str = "showroom_cache_refresh_ms";

/// Result of asking for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// This caller claimed the marker and a refresh task was spawned.
    Scheduled,
    /// Another refresh holds the marker.
    AlreadyRunning,
    /// The marker could not be claimed because the store failed.
    Unavailable,
}

/// How a background refresh ended.
#[derive(Debug)]
pub enum RefreshOutcome {
    Refreshed,
    /// The marker vanished or changed hands while computing; the result
    /// was dropped.
    Superseded,
    NotCacheable(StatusCode),
    TooLarge(usize),
    Failed(String),
    Panicked,
    TimedOut,
    WriteFailed,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refreshed => "refreshed",
            Self::Superseded => "superseded",
            Self::NotCacheable(_) => "not_cacheable",
            Self::TooLarge(_) => "too_large",
            Self::Failed(_) => "failed",
            Self::Panicked => "panicked",
            Self::TimedOut => "timed_out",
            Self::WriteFailed => "write_failed",
        }
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(tracker: &Arc<InFlight>) -> Self {
        tracker.count.fetch_add(1, Ordering::SeqCst);
        Self(tracker.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Schedules at most one background refresh per key.
pub struct RefreshCoordinator {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn ResponseSource>,
    policy: FreshnessPolicy,
    lock_ttl: Duration,
    timeout: Duration,
    max_body_bytes: usize,
    in_flight: Arc<InFlight>,
}

impl RefreshCoordinator {
    pub fn new(
        config: &CacheConfig,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn ResponseSource>,
    ) -> Self {
        Self {
            store,
            clock,
            source,
            policy: config.policy(),
            lock_ttl: config.refresh_lock_ttl,
            timeout: config.refresh_timeout.min(config.refresh_lock_ttl),
            max_body_bytes: config.max_body_bytes,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Claims the refresh marker for `key` and, on success, spawns the
    /// refresh. Never waits for the refresh itself.
    pub async fn try_schedule(&self, key: &CacheKey, request: &CacheRequest) -> RefreshDecision {
        let marker = key.refresh_marker();
        let token = Uuid::new_v4().to_string();

        match self
            .store
            .put_if_absent(&marker, Bytes::from(token.clone()), self.lock_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(cache_key = %key, "refresh already in flight");
                return RefreshDecision::AlreadyRunning;
            }
            Err(err) => {
                record_store_error("put_if_absent");
                warn!(cache_key = %key, error = %err, "refresh marker could not be claimed");
                return RefreshDecision::Unavailable;
            }
        }

        let task = RefreshTask {
            store: self.store.clone(),
            clock: self.clock.clone(),
            source: self.source.clone(),
            policy: self.policy,
            timeout: self.timeout,
            max_body_bytes: self.max_body_bytes,
            key: key.clone(),
            marker,
            token,
            request: request.clone(),
        };
        let guard = InFlightGuard::enter(&self.in_flight);
        tokio::spawn(async move {
            let _guard = guard;
            task.run().await;
        });

        RefreshDecision::Scheduled
    }

    /// Number of refresh tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Waits until no refresh is in flight.
    pub async fn settle(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}

struct RefreshTask {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn ResponseSource>,
    policy: FreshnessPolicy,
    timeout: Duration,
    max_body_bytes: usize,
    key: CacheKey,
    marker: String,
    token: String,
    request: CacheRequest,
}

impl RefreshTask {
    async fn run(self) {
        let started_at = Instant::now();
        let outcome = self.attempt().await;

        match &outcome {
            RefreshOutcome::Refreshed => {
                info!(cache_key = %self.key, outcome = outcome.as_str(), "cache entry refreshed");
            }
            RefreshOutcome::Superseded => {
                info!(
                    cache_key = %self.key,
                    outcome = outcome.as_str(),
                    "refresh result dropped after invalidation"
                );
            }
            RefreshOutcome::NotCacheable(status) => {
                warn!(
                    cache_key = %self.key,
                    outcome = outcome.as_str(),
                    status = status.as_u16(),
                    "refresh produced a non-cacheable response; keeping stale entry"
                );
            }
            RefreshOutcome::TooLarge(len) => {
                warn!(
                    cache_key = %self.key,
                    outcome = outcome.as_str(),
                    body_bytes = len,
                    "refresh produced an oversized body; keeping stale entry"
                );
            }
            RefreshOutcome::Failed(reason) => {
                warn!(
                    cache_key = %self.key,
                    outcome = outcome.as_str(),
                    error = %reason,
                    "refresh failed; keeping stale entry"
                );
            }
            RefreshOutcome::Panicked | RefreshOutcome::TimedOut | RefreshOutcome::WriteFailed => {
                warn!(
                    cache_key = %self.key,
                    outcome = outcome.as_str(),
                    "refresh aborted; keeping stale entry"
                );
            }
        }

        counter!(METRIC_CACHE_REFRESH_TOTAL, "outcome" => outcome.as_str()).increment(1);
        histogram!(METRIC_CACHE_REFRESH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        self.release().await;
    }

    async fn attempt(&self) -> RefreshOutcome {
        let source = self.source.clone();
        let request = self.request.clone();
        let mut compute = tokio::spawn(async move { source.compute(&request).await });

        let response = match tokio::time::timeout(self.timeout, &mut compute).await {
            Err(_) => {
                compute.abort();
                return RefreshOutcome::TimedOut;
            }
            Ok(Err(join_err)) if join_err.is_panic() => return RefreshOutcome::Panicked,
            Ok(Err(join_err)) => return RefreshOutcome::Failed(join_err.to_string()),
            Ok(Ok(Err(err))) => return RefreshOutcome::Failed(err.to_string()),
            Ok(Ok(Ok(response))) => response,
        };

        if !response.is_cacheable() {
            return RefreshOutcome::NotCacheable(response.status);
        }
        if response.content.len() > self.max_body_bytes {
            return RefreshOutcome::TooLarge(response.content.len());
        }
        if !self.holds_marker().await {
            return RefreshOutcome::Superseded;
        }

        let entry = CacheEntry::encode(
            response.content,
            response.headers,
            &self.policy,
            self.clock.now(),
        );
        if write_entry(self.store.as_ref(), &self.key, &entry, self.policy.entry_ttl()).await {
            RefreshOutcome::Refreshed
        } else {
            RefreshOutcome::WriteFailed
        }
    }

    async fn holds_marker(&self) -> bool {
        match self.store.get(&self.marker).await {
            Ok(Some(value)) => value.as_ref() == self.token.as_bytes(),
            Ok(None) => false,
            Err(err) => {
                record_store_error("get");
                warn!(cache_key = %self.key, error = %err, "refresh marker could not be read");
                false
            }
        }
    }

    async fn release(&self) {
        if let Ok(Some(value)) = self.store.get(&self.marker).await
            && value.as_ref() != self.token.as_bytes()
        {
            return;
        }
        if let Err(err) = self.store.forget(&self.marker).await {
            record_store_error("forget");
            warn!(cache_key = %self.key, error = %err, "refresh marker could not be released");
        }
    }
}
