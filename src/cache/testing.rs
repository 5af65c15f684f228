//! Test doubles for the cache: a scripted response source and a store that
//! fails on demand.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::json;
use tokio::sync::Notify;

use super::source::{CacheRequest, ResponseSource, SourceError, SourceResponse};
use super::store::{CacheStore, MemoryStore, StoreError};

#[derive(Clone)]
pub(crate) enum Mode {
    Ok,
    Fail,
    Panic,
    Sleep(Duration),
    Status(StatusCode),
    Gated(Arc<Notify>),
}

/// Source returning `{"namespace": …, "version": n}` and counting calls.
pub(crate) struct ScriptedSource {
    calls: AtomicUsize,
    version: AtomicU64,
    mode: Mutex<Mode>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            version: AtomicU64::new(1),
            mode: Mutex::new(Mode::Ok),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_version(&self, version: u64) {
        self.version.store(version, Ordering::SeqCst);
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        *self.mode.lock().expect("mode lock") = mode;
    }

    /// Makes every compute wait for a permit on the returned gate.
    pub(crate) fn gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.set_mode(Mode::Gated(gate.clone()));
        gate
    }

    pub(crate) fn body_for(&self, version: u64) -> Bytes {
        Bytes::from(json!({ "namespace": "cars", "version": version }).to_string())
    }

    fn render(&self, request: &CacheRequest, status: StatusCode) -> SourceResponse {
        let version = self.version.load(Ordering::SeqCst);
        SourceResponse::json(
            status,
            &json!({ "namespace": request.namespace, "version": version }),
        )
        .expect("json body")
    }
}

#[async_trait]
impl ResponseSource for ScriptedSource {
    async fn compute(&self, request: &CacheRequest) -> Result<SourceResponse, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().expect("mode lock").clone();
        match mode {
            Mode::Ok => Ok(self.render(request, StatusCode::OK)),
            Mode::Fail => Err(SourceError::unavailable("scripted failure")),
            Mode::Panic => panic!("scripted panic"),
            Mode::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(self.render(request, StatusCode::OK))
            }
            Mode::Status(status) => Ok(self.render(request, status)),
            Mode::Gated(gate) => {
                gate.notified().await;
                Ok(self.render(request, StatusCode::OK))
            }
        }
    }
}

/// [`MemoryStore`] wrapper whose reads, writes or prefix scans can be made
/// to fail.
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    no_prefix: AtomicBool,
    flushes: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            no_prefix: AtomicBool::new(false),
            flushes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub(crate) fn without_prefix_scan(&self, on: bool) {
        self.no_prefix.store(on, Ordering::SeqCst);
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn read_guard(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("scripted read failure"));
        }
        Ok(())
    }

    fn write_guard(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("scripted write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.read_guard()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.write_guard()?;
        self.inner.put(key, value, ttl).await
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.write_guard()?;
        self.inner.put_if_absent(key, value, ttl).await
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        self.read_guard()?;
        self.inner.has(key).await
    }

    async fn forget(&self, key: &str) -> Result<bool, StoreError> {
        self.write_guard()?;
        self.inner.forget(key).await
    }

    async fn forget_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        if self.no_prefix.load(Ordering::SeqCst) {
            return Err(StoreError::Unsupported("forget_prefix"));
        }
        self.write_guard()?;
        self.inner.forget_prefix(prefix).await
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.write_guard()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.inner.flush_all().await
    }
}
