//! Cache invalidation events.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::EntityKind;

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Cache event with idempotency and ordering support.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// What was done to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A committed create, update or delete of one entity.
    EntityChanged {
        entity: EntityKind,
        id: Uuid,
        change: ChangeKind,
    },
    /// Operator-requested removal of every entry.
    Purge,
}

/// Hands out increasing epochs.
#[derive(Debug, Default)]
pub struct EpochCounter(AtomicU64);

impl EpochCounter {
    pub fn next(&self) -> Epoch {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_creation() {
        let kind = EventKind::Purge;
        let event = CacheEvent::new(kind.clone(), 42);

        assert_eq!(event.epoch, 42);
        assert_eq!(event.kind, kind);
        assert!(!event.id.is_nil());
    }

    #[test]
    fn epoch_monotonicity() {
        let epochs = EpochCounter::default();

        let e1 = epochs.next();
        let e2 = epochs.next();
        let e3 = epochs.next();

        assert!(e1 < e2);
        assert!(e2 < e3);
    }

    #[test]
    fn event_kind_equality() {
        let id = Uuid::new_v4();
        let a = EventKind::EntityChanged {
            entity: EntityKind::Car,
            id,
            change: ChangeKind::Updated,
        };
        let b = EventKind::EntityChanged {
            entity: EntityKind::Car,
            id,
            change: ChangeKind::Updated,
        };
        let c = EventKind::EntityChanged {
            entity: EntityKind::Dealer,
            id,
            change: ChangeKind::Updated,
        };

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
