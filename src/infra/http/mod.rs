//! HTTP surface: cached catalog reads, guarded inventory writes, cache purge.

mod admin;
mod auth;
mod catalog;
mod inventory;
mod middleware;

pub use auth::X_ADMIN_TOKEN;
use middleware::{log_responses, set_request_context};

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use crate::application::inventory::InventoryService;
use crate::cache::{CacheTrigger, ResponseCache};

#[derive(Clone)]
pub struct HttpState {
    pub cache: ResponseCache,
    pub inventory: InventoryService,
    pub trigger: Arc<CacheTrigger>,
    /// `None` disables every guarded route.
    pub admin_token: Option<Arc<str>>,
}

pub fn build_router(state: HttpState) -> Router {
    let guarded = Router::new()
        .route("/api/v1/cars", post(inventory::create_car))
        .route(
            "/api/v1/cars/{id}",
            patch(inventory::update_car).delete(inventory::delete_car),
        )
        .route("/api/v1/dealers", post(inventory::create_dealer))
        .route(
            "/api/v1/dealers/{id}",
            patch(inventory::update_dealer).delete(inventory::delete_dealer),
        )
        .route("/api/v1/cache/purge", post(admin::purge_cache))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let public = Router::new()
        .route("/api/v1/cars", get(catalog::list_cars))
        .route("/api/v1/cars/{id}", get(catalog::show_car))
        .route("/api/v1/dealers", get(catalog::list_dealers))
        .route("/api/v1/dealers/{id}", get(catalog::show_dealer))
        .route("/health", get(admin::health));

    public
        .merge(guarded)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
