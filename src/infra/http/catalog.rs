//! Cached read routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
};
use uuid::Uuid;

use crate::application::error::HttpError;
use crate::cache::{
    CacheRequest, CachedReply, detail_namespace, if_none_match, listing_namespace,
    params_from_query,
};
use crate::domain::EntityKind;

use super::HttpState;

pub(super) async fn list_cars(
    State(state): State<HttpState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<CachedReply, HttpError> {
    respond(&state, listing_namespace(EntityKind::Car), &uri, &headers).await
}

pub(super) async fn show_car(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<CachedReply, HttpError> {
    respond(&state, detail(EntityKind::Car, &id), &uri, &headers).await
}

pub(super) async fn list_dealers(
    State(state): State<HttpState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<CachedReply, HttpError> {
    respond(&state, listing_namespace(EntityKind::Dealer), &uri, &headers).await
}

pub(super) async fn show_dealer(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<CachedReply, HttpError> {
    respond(&state, detail(EntityKind::Dealer, &id), &uri, &headers).await
}

/// Namespace shared by every detail id that is not a UUID.
const INVALID_ID: &str = "invalid";

/// Canonical detail namespace. Ids that are not UUIDs all map to one
/// sentinel namespace, which the catalog answers with 404, so a raw path
/// segment never becomes part of a cache key.
fn detail(kind: EntityKind, raw: &str) -> String {
    match Uuid::parse_str(raw) {
        Ok(id) => detail_namespace(kind, id),
        Err(_) => format!("{}/{INVALID_ID}", kind.collection()),
    }
}

async fn respond(
    state: &HttpState,
    namespace: String,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<CachedReply, HttpError> {
    let request = CacheRequest::new(namespace, params_from_query(uri.query()));
    state
        .cache
        .respond(request, if_none_match(headers))
        .await
        .map_err(HttpError::from)
}
