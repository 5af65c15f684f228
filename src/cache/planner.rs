//! Invalidation plan generation.
//!
//! Merges cache events into the set of key scopes that must be removed.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::domain::EntityKind;

use super::events::{CacheEvent, EventKind};
use super::keys::{detail_namespace, detail_prefix, listing_namespace};

/// A region of the key space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// The bare namespace key plus every `"{namespace}:…"` key.
    Namespace(String),
    /// Every key starting with the prefix.
    Prefix(String),
}

impl Scope {
    fn is_covered_by(&self, prefix: &str) -> bool {
        match self {
            Scope::Namespace(namespace) => namespace.starts_with(prefix),
            Scope::Prefix(other) => other != prefix && other.starts_with(prefix),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Namespace(namespace) => write!(f, "{namespace}[:*]"),
            Scope::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// Actions needed to make the cache consistent with committed writes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub scopes: BTreeSet<Scope>,
    /// Remove everything; makes `scopes` irrelevant.
    pub flush_all: bool,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flush_all {
            return f.write_str("InvalidationPlan { flush_all }");
        }
        let scopes: Vec<String> = self.scopes.iter().map(Scope::to_string).collect();
        write!(f, "InvalidationPlan {{ scopes: [{}] }}", scopes.join(", "))
    }
}

impl InvalidationPlan {
    /// Merges `events` into one plan.
    ///
    /// - Deduplicates by event ID
    /// - Expands each entity change to the scopes it affects
    /// - Drops scopes already covered by a broader prefix
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            match event.kind {
                EventKind::Purge => plan.flush_all = true,
                EventKind::EntityChanged { entity, id, .. } => {
                    plan.scopes.extend(affected_scopes(entity, id));
                }
            }
        }

        if plan.flush_all {
            plan.scopes.clear();
        } else {
            plan.compact();
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        !self.flush_all && self.scopes.is_empty()
    }

    fn compact(&mut self) {
        let prefixes: Vec<String> = self
            .scopes
            .iter()
            .filter_map(|scope| match scope {
                Scope::Prefix(prefix) => Some(prefix.clone()),
                Scope::Namespace(_) => None,
            })
            .collect();
        self.scopes
            .retain(|scope| !prefixes.iter().any(|prefix| scope.is_covered_by(prefix)));
    }
}

/// Scopes whose cached responses may embed `entity`.
///
/// Car responses embed their dealer, so a dealer change reaches every car
/// listing and car detail.
pub fn affected_scopes(entity: EntityKind, id: Uuid) -> Vec<Scope> {
    let mut scopes = vec![
        Scope::Namespace(detail_namespace(entity, id)),
        Scope::Namespace(listing_namespace(entity)),
    ];
    for dependent in entity.dependents() {
        scopes.push(Scope::Namespace(listing_namespace(*dependent)));
        scopes.push(Scope::Prefix(detail_prefix(*dependent)));
    }
    scopes
}
