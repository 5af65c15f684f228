//! Response cache pipeline.
//!
//! Serves one cacheable read: resolve the key, look the entry up, answer
//! conditional requests, classify freshness, schedule a refresh for stale
//! hits and recompute on miss. Store failures never fail a read; they
//! degrade to a miss or to an unstored response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{AGE, CACHE_CONTROL, ETAG},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::counter;
use tracing::{Span, debug, field, instrument, warn};

use super::clock::Clock;
use super::codec::{CacheEntry, HeaderValues};
use super::conditional::{Precondition, evaluate};
use super::config::CacheConfig;
use super::freshness::{Freshness, age_seconds, classify};
use super::keys::CacheKey;
use super::refresh::RefreshCoordinator;
use super::source::{CacheRequest, ResponseSource, SourceError, SourceResponse};
use super::store::CacheStore;

const METRIC_CACHE_HIT_TOTAL: &str = "showroom_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "showroom_cache_miss_total";
const METRIC_CACHE_NOT_MODIFIED_TOTAL: &str = "showroom_cache_not_modified_total";
const METRIC_CACHE_STORE_ERROR_TOTAL: &str = "showroom_cache_store_error_total";

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_KEY: HeaderName = HeaderName::from_static("x-cache-key");
pub const X_QUERY_TIME_MS: HeaderName = HeaderName::from_static("x-query-time-ms");

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Caching disabled; the reply came straight from the source.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
        }
    }
}

/// Reply rendered by the pipeline, ready to become an HTTP response.
#[derive(Debug)]
pub struct CachedReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache_status: CacheStatus,
}

impl CachedReply {
    fn hit(key: &CacheKey, entry: CacheEntry, age: u64, started_at: Instant) -> Self {
        let cache_control = entry.cache_control();
        let (content, stored, etag) = entry.decode();
        let mut headers = replay(&stored);
        insert_validators(&mut headers, &cache_control, &etag);
        insert_age(&mut headers, age);
        insert_observability(&mut headers, CacheStatus::Hit, key, started_at);
        Self {
            status: StatusCode::OK,
            headers,
            body: content,
            cache_status: CacheStatus::Hit,
        }
    }

    fn not_modified(key: &CacheKey, entry: &CacheEntry, age: u64, started_at: Instant) -> Self {
        let mut headers = HeaderMap::new();
        insert_validators(&mut headers, &entry.cache_control(), &entry.etag);
        insert_age(&mut headers, age);
        insert_observability(&mut headers, CacheStatus::Hit, key, started_at);
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers,
            body: Bytes::new(),
            cache_status: CacheStatus::Hit,
        }
    }

    fn miss(key: &CacheKey, entry: CacheEntry, started_at: Instant) -> Self {
        let cache_control = entry.cache_control();
        let (content, stored, etag) = entry.decode();
        let mut headers = replay(&stored);
        insert_validators(&mut headers, &cache_control, &etag);
        insert_observability(&mut headers, CacheStatus::Miss, key, started_at);
        Self {
            status: StatusCode::OK,
            headers,
            body: content,
            cache_status: CacheStatus::Miss,
        }
    }

    fn pass_through(key: &CacheKey, response: SourceResponse, started_at: Instant) -> Self {
        let mut headers = replay(&response.headers);
        insert_observability(&mut headers, CacheStatus::Miss, key, started_at);
        Self {
            status: response.status,
            headers,
            body: response.content,
            cache_status: CacheStatus::Miss,
        }
    }

    fn bypass(response: SourceResponse) -> Self {
        let mut headers = replay(&response.headers);
        headers.insert(X_CACHE, HeaderValue::from_static(CacheStatus::Bypass.as_str()));
        Self {
            status: response.status,
            headers,
            body: response.content,
            cache_status: CacheStatus::Bypass,
        }
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

impl IntoResponse for CachedReply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

struct Inner {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn ResponseSource>,
    refresh: RefreshCoordinator,
}

/// Cache in front of a [`ResponseSource`].
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl ResponseCache {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn ResponseSource>,
    ) -> Self {
        let refresh =
            RefreshCoordinator::new(&config, store.clone(), clock.clone(), source.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                clock,
                source,
                refresh,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.inner.store
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Serves `request`, honouring `validator` from `If-None-Match`.
    ///
    /// Only a source failure on the synchronous path is an error.
    #[instrument(
        skip_all,
        fields(namespace = %request.namespace, cache_key = field::Empty, outcome = field::Empty)
    )]
    pub async fn respond(
        &self,
        request: CacheRequest,
        validator: Option<&str>,
    ) -> Result<CachedReply, SourceError> {
        let started_at = Instant::now();
        let inner = &self.inner;

        if !inner.config.is_enabled() {
            let response = inner.source.compute(&request).await?;
            return Ok(CachedReply::bypass(response));
        }

        let key = request.key();
        let span = Span::current();
        span.record("cache_key", key.as_str());

        let now = inner.clock.now();
        if let Some(entry) = read_entry(inner.store.as_ref(), &key).await {
            let freshness = classify(&entry, now);
            if freshness.is_servable() {
                if freshness == Freshness::Stale {
                    let decision = inner.refresh.try_schedule(&key, &request).await;
                    debug!(cache_key = %key, ?decision, "stale entry served");
                }
                let age = age_seconds(&entry, now);
                return Ok(match evaluate(validator, Some(&entry)) {
                    Precondition::NotModified => {
                        counter!(METRIC_CACHE_NOT_MODIFIED_TOTAL).increment(1);
                        span.record("outcome", "not_modified");
                        CachedReply::not_modified(&key, &entry, age, started_at)
                    }
                    Precondition::Proceed => {
                        counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                        span.record("outcome", freshness.as_str());
                        CachedReply::hit(&key, entry, age, started_at)
                    }
                });
            }
            debug!(cache_key = %key, "cached entry expired; recomputing");
        }

        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        span.record("outcome", "miss");

        let response = inner.source.compute(&request).await?;
        if !response.is_cacheable() {
            return Ok(CachedReply::pass_through(&key, response, started_at));
        }

        let policy = inner.config.policy();
        let entry = CacheEntry::encode(
            response.content,
            response.headers,
            &policy,
            inner.clock.now(),
        );
        if entry.content.len() > inner.config.max_body_bytes {
            debug!(
                cache_key = %key,
                body_bytes = entry.content.len(),
                limit = inner.config.max_body_bytes,
                "response too large to cache"
            );
        } else {
            write_entry(inner.store.as_ref(), &key, &entry, policy.entry_ttl()).await;
        }

        Ok(CachedReply::miss(&key, entry, started_at))
    }
}

/// Loads and decodes the entry under `key`.
///
/// Store errors read as a miss. An undecodable entry is forgotten.
pub(crate) async fn read_entry(store: &dyn CacheStore, key: &CacheKey) -> Option<CacheEntry> {
    let raw = match store.get(key.as_str()).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            record_store_error("get");
            warn!(cache_key = %key, error = %err, "cache read failed; treating as miss");
            return None;
        }
    };

    match CacheEntry::from_bytes(&raw) {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(cache_key = %key, error = %err, "dropping undecodable cache entry");
            if store.forget(key.as_str()).await.is_err() {
                record_store_error("forget");
            }
            None
        }
    }
}

/// Stores `entry` under `key`. Failures are logged and reported as `false`.
pub(crate) async fn write_entry(
    store: &dyn CacheStore,
    key: &CacheKey,
    entry: &CacheEntry,
    ttl: Duration,
) -> bool {
    let raw = match entry.to_bytes() {
        Ok(raw) => raw,
        Err(err) => {
            warn!(cache_key = %key, error = %err, "cache entry could not be encoded");
            return false;
        }
    };

    match store.put(key.as_str(), raw, ttl).await {
        Ok(()) => true,
        Err(err) => {
            record_store_error("put");
            warn!(cache_key = %key, error = %err, "cache write dropped");
            false
        }
    }
}

pub(crate) fn record_store_error(op: &'static str) {
    counter!(METRIC_CACHE_STORE_ERROR_TOTAL, "op" => op).increment(1);
}

fn replay(stored: &HeaderValues) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, values) in stored {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    headers
}

fn insert_validators(headers: &mut HeaderMap, cache_control: &str, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(cache_control) {
        headers.insert(CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(ETAG, value);
    }
}

fn insert_age(headers: &mut HeaderMap, age: u64) {
    headers.insert(AGE, HeaderValue::from(age));
}

fn insert_observability(
    headers: &mut HeaderMap,
    status: CacheStatus,
    key: &CacheKey,
    started_at: Instant,
) {
    headers.insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    if let Ok(value) = HeaderValue::from_str(key.as_str()) {
        headers.insert(X_CACHE_KEY, value);
    }
    let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.2}")) {
        headers.insert(X_QUERY_TIME_MS, value);
    }
}
