//! Wiring of stores, services and HTTP state.

use std::sync::Arc;

use crate::application::catalog::{CatalogService, CatalogSettings};
use crate::application::inventory::InventoryService;
use crate::application::repos::{InventoryRepo, InventoryWriteRepo};
use crate::cache::{CacheConfig, CacheConsumer, CacheStore, CacheTrigger, Clock, ResponseCache};

use super::http::HttpState;

/// Collaborators the application is assembled from.
pub struct Components {
    pub cache_config: CacheConfig,
    pub catalog: CatalogSettings,
    pub admin_token: Option<String>,
    pub reader: Arc<dyn InventoryRepo>,
    pub writer: Arc<dyn InventoryWriteRepo>,
    pub store: Arc<dyn CacheStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct ApplicationContext {
    pub http: HttpState,
    pub cache: ResponseCache,
    pub trigger: Arc<CacheTrigger>,
}

pub fn assemble(components: Components) -> ApplicationContext {
    let Components {
        cache_config,
        catalog,
        admin_token,
        reader,
        writer,
        store,
        clock,
    } = components;

    let catalog = Arc::new(CatalogService::new(reader.clone(), catalog));
    let cache = ResponseCache::new(cache_config.clone(), store.clone(), clock.clone(), catalog);

    let consumer = Arc::new(CacheConsumer::new(store));
    let trigger = Arc::new(CacheTrigger::new(cache_config.clone(), consumer));
    let write_trigger = cache_config.is_enabled().then(|| trigger.clone());

    let inventory =
        InventoryService::new(reader, writer, clock).with_cache_trigger_opt(write_trigger);

    let http = HttpState {
        cache: cache.clone(),
        inventory,
        trigger: trigger.clone(),
        admin_token: admin_token.map(Arc::from),
    };

    ApplicationContext {
        http,
        cache,
        trigger,
    }
}
