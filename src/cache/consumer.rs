//! Cache consumer for executing invalidation plans.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::pipeline::record_store_error;
use super::planner::{InvalidationPlan, Scope};
use super::store::{CacheStore, StoreError};

const METRIC_CACHE_INVALIDATE_MS: &str = "showroom_cache_invalidate_ms";
const METRIC_CACHE_FLUSH_TOTAL: &str = "showroom_cache_flush_total";

/// Why the whole store was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Purge,
    /// The store cannot remove by prefix.
    Unsupported,
    /// Targeted removal hit a store error.
    Fallback,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purge => "purge",
            Self::Unsupported => "unsupported",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeReport {
    Noop,
    Targeted { removed: usize },
    Flushed { reason: FlushReason },
}

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("cache flush ({reason}) failed")]
    Flush {
        reason: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Executes plans against the store.
///
/// Targeted removal runs first; any failure escalates to a full flush so a
/// failed invalidation never leaves stale entries behind silently.
pub struct CacheConsumer {
    store: Arc<dyn CacheStore>,
}

impl CacheConsumer {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(plan = %plan))]
    pub async fn consume(&self, plan: &InvalidationPlan) -> Result<ConsumeReport, InvalidationError> {
        if plan.is_empty() {
            return Ok(ConsumeReport::Noop);
        }

        let started_at = Instant::now();
        let result = if plan.flush_all {
            self.flush(FlushReason::Purge).await
        } else {
            match self.remove_scopes(plan).await {
                Ok(removed) => {
                    info!(removed, "Cache invalidation complete");
                    Ok(ConsumeReport::Targeted { removed })
                }
                Err(err) => {
                    let reason = if err.is_unsupported() {
                        FlushReason::Unsupported
                    } else {
                        record_store_error("invalidate");
                        FlushReason::Fallback
                    };
                    warn!(
                        error = %err,
                        reason = reason.as_str(),
                        "Targeted invalidation failed; flushing cache"
                    );
                    self.flush(reason).await
                }
            }
        };

        histogram!(METRIC_CACHE_INVALIDATE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn remove_scopes(&self, plan: &InvalidationPlan) -> Result<usize, StoreError> {
        let mut removed = 0;
        for scope in &plan.scopes {
            removed += match scope {
                Scope::Namespace(namespace) => self.store.flush_namespace(namespace).await?,
                Scope::Prefix(prefix) => self.store.forget_prefix(prefix).await?,
            };
        }
        Ok(removed)
    }

    async fn flush(&self, reason: FlushReason) -> Result<ConsumeReport, InvalidationError> {
        match self.store.flush_all().await {
            Ok(()) => {
                counter!(METRIC_CACHE_FLUSH_TOTAL, "reason" => reason.as_str()).increment(1);
                info!(reason = reason.as_str(), "Cache flushed");
                Ok(ConsumeReport::Flushed { reason })
            }
            Err(source) => {
                record_store_error("flush_all");
                error!(
                    error = %source,
                    reason = reason.as_str(),
                    "Cache flush failed; stale entries may remain until they expire"
                );
                Err(InvalidationError::Flush {
                    reason: reason.as_str(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use bytes::Bytes;
    use uuid::Uuid;

    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::events::{CacheEvent, ChangeKind, EventKind};
    use crate::cache::store::MemoryStore;
    use crate::cache::testing::FlakyStore;
    use crate::domain::EntityKind;

    const TTL: Duration = Duration::from_secs(180);

    async fn seeded_store(keys: &[&str]) -> Arc<FlakyStore> {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(FlakyStore::new(MemoryStore::new(
            NonZeroUsize::new(64).expect("capacity"),
            clock,
        )));
        for key in keys {
            store
                .put(key, Bytes::from_static(b"v"), TTL)
                .await
                .expect("seed");
        }
        store
    }

    fn plan_for(entity: EntityKind, id: Uuid) -> InvalidationPlan {
        InvalidationPlan::from_events(vec![CacheEvent::new(
            EventKind::EntityChanged {
                entity,
                id,
                change: ChangeKind::Updated,
            },
            0,
        )])
    }

    #[tokio::test]
    async fn empty_plan_is_a_noop() {
        let store = seeded_store(&["cars"]).await;
        let consumer = CacheConsumer::new(store.clone());
        let report = consumer
            .consume(&InvalidationPlan::default())
            .await
            .expect("consume");
        assert_eq!(report, ConsumeReport::Noop);
        assert!(store.has("cars").await.expect("has"));
    }

    #[tokio::test]
    async fn car_update_removes_listing_and_its_detail_only() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let detail = format!("cars/{id}");
        let detail_variant = format!("cars/{id}:abc");
        let other_detail = format!("cars/{other}");
        let store = seeded_store(&[
            "cars",
            "cars:abc",
            "cars:refresh",
            detail.as_str(),
            detail_variant.as_str(),
            other_detail.as_str(),
            "dealers",
        ])
        .await;

        let consumer = CacheConsumer::new(store.clone());
        let report = consumer
            .consume(&plan_for(EntityKind::Car, id))
            .await
            .expect("consume");

        assert_eq!(report, ConsumeReport::Targeted { removed: 5 });
        assert!(store.has(&other_detail).await.expect("has"));
        assert!(store.has("dealers").await.expect("has"));
        assert_eq!(store.flushes(), 0);
    }

    #[tokio::test]
    async fn dealer_update_removes_car_details() {
        let dealer = Uuid::new_v4();
        let car_detail = format!("cars/{}", Uuid::new_v4());
        let store = seeded_store(&["cars:abc", car_detail.as_str(), "dealers"]).await;

        let consumer = CacheConsumer::new(store.clone());
        consumer
            .consume(&plan_for(EntityKind::Dealer, dealer))
            .await
            .expect("consume");

        assert!(!store.has("cars:abc").await.expect("has"));
        assert!(!store.has(&car_detail).await.expect("has"));
        assert!(!store.has("dealers").await.expect("has"));
    }

    #[tokio::test]
    async fn unsupported_prefix_scan_falls_back_to_flush() {
        let store = seeded_store(&["cars", "dealers"]).await;
        store.without_prefix_scan(true);

        let consumer = CacheConsumer::new(store.clone());
        let report = consumer
            .consume(&plan_for(EntityKind::Car, Uuid::new_v4()))
            .await
            .expect("consume");

        assert_eq!(
            report,
            ConsumeReport::Flushed {
                reason: FlushReason::Unsupported
            }
        );
        assert!(!store.has("dealers").await.expect("has"));
    }

    #[tokio::test]
    async fn failed_flush_is_returned_to_caller() {
        let store = seeded_store(&["cars"]).await;
        store.fail_writes(true);

        let consumer = CacheConsumer::new(store.clone());
        let err = consumer
            .consume(&plan_for(EntityKind::Car, Uuid::new_v4()))
            .await
            .expect_err("flush should fail");

        assert!(matches!(err, InvalidationError::Flush { reason: "fallback", .. }));
    }

    #[tokio::test]
    async fn repeated_invalidation_is_idempotent() {
        let id = Uuid::new_v4();
        let store = seeded_store(&["cars"]).await;
        let consumer = CacheConsumer::new(store.clone());

        let plan = plan_for(EntityKind::Car, id);
        consumer.consume(&plan).await.expect("first");
        let report = consumer.consume(&plan).await.expect("second");

        assert_eq!(report, ConsumeReport::Targeted { removed: 0 });
    }
}
