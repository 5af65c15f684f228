//! Shared-secret guard for write and purge routes.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, Request, StatusCode, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::application::error::HttpError;

use super::HttpState;

pub const X_ADMIN_TOKEN: HeaderName = HeaderName::from_static("x-admin-token");

const SOURCE: &str = "infra::http::auth::require_admin";

pub async fn require_admin(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "admin routes are disabled: no admin token configured",
        )
        .into_response();
    };

    let Some(presented) = extract_token(request.headers()) else {
        return HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "missing admin token",
        )
        .into_response();
    };

    if !tokens_match(presented, expected) {
        return HttpError::new(
            SOURCE,
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "admin token mismatch",
        )
        .into_response();
    }

    next.run(request).await
}

/// `Authorization: Bearer …` wins over `X-Admin-Token`.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .or_else(|| {
            headers
                .get(X_ADMIN_TOKEN)
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
