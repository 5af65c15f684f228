use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

use crate::application::catalog::MessageBody;
use crate::application::error::HttpError;
use crate::cache::ConsumeReport;

use super::HttpState;

/// Clears every cached response, including refresh markers.
pub(super) async fn purge_cache(
    State(state): State<HttpState>,
) -> Result<(StatusCode, Json<MessageBody>), HttpError> {
    let report = state.trigger.purge().await?;
    if !matches!(report, ConsumeReport::Noop) {
        info!(target = "showroom::http::admin", ?report, "Cache purged");
    }
    Ok((StatusCode::OK, Json(MessageBody::message("Cache purged"))))
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
