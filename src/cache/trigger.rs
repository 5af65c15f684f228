//! Cache trigger service.
//!
//! Entry point for write paths: turns committed mutations into cache events
//! and consumes them before returning, so the next read observes the write.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::EntityKind;

use super::config::CacheConfig;
use super::consumer::{CacheConsumer, ConsumeReport, InvalidationError};
use super::events::{CacheEvent, ChangeKind, EpochCounter, EventKind};
use super::planner::InvalidationPlan;

/// Cache trigger for publishing cache events.
///
/// # Usage
///
/// ```ignore
/// // After a car update commits:
/// trigger.car_changed(car.id, ChangeKind::Updated).await?;
/// ```
pub struct CacheTrigger {
    config: CacheConfig,
    epochs: EpochCounter,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            epochs: EpochCounter::default(),
            consumer,
        }
    }

    /// Plans and executes invalidation for `kinds` as one batch.
    pub async fn trigger(
        &self,
        kinds: Vec<EventKind>,
    ) -> Result<ConsumeReport, InvalidationError> {
        if !self.config.is_enabled() {
            debug!(event_kinds = ?kinds, "Cache trigger skipped: cache disabled");
            return Ok(ConsumeReport::Noop);
        }

        let events: Vec<CacheEvent> = kinds
            .into_iter()
            .map(|kind| CacheEvent::new(kind, self.epochs.next()))
            .collect();
        for event in &events {
            info!(
                event_id = %event.id,
                event_epoch = event.epoch,
                event_kind = ?event.kind,
                "Cache event published"
            );
        }

        let plan = InvalidationPlan::from_events(events);
        self.consumer.consume(&plan).await
    }

    pub async fn on_entity_changed(
        &self,
        entity: EntityKind,
        id: Uuid,
        change: ChangeKind,
    ) -> Result<ConsumeReport, InvalidationError> {
        self.trigger(vec![EventKind::EntityChanged { entity, id, change }])
            .await
    }

    pub async fn car_changed(
        &self,
        id: Uuid,
        change: ChangeKind,
    ) -> Result<ConsumeReport, InvalidationError> {
        self.on_entity_changed(EntityKind::Car, id, change).await
    }

    pub async fn dealer_changed(
        &self,
        id: Uuid,
        change: ChangeKind,
    ) -> Result<ConsumeReport, InvalidationError> {
        self.on_entity_changed(EntityKind::Dealer, id, change).await
    }

    /// Removes every cached entry.
    pub async fn purge(&self) -> Result<ConsumeReport, InvalidationError> {
        self.trigger(vec![EventKind::Purge]).await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
