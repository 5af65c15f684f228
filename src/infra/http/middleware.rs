use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::cache::X_CACHE;

const TARGET: &str = "showroom::http::response";

#[derive(Clone)]
pub(super) struct RequestId(Uuid);

pub(super) async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(RequestId(Uuid::new_v4()));
    next.run(request).await
}

/// Logs every 4xx at `warn` and 5xx at `error`, with the attached
/// [`ErrorReport`] chain when the handler left one.
pub(super) async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.to_string())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let elapsed_ms = start.elapsed().as_millis();
    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let cache = response
        .headers()
        .get(X_CACHE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if status.is_server_error() {
        error!(
            target: TARGET,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            chain = ?messages,
            %request_id,
            cache,
            "request failed"
        );
    } else {
        warn!(
            target: TARGET,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            chain = ?messages,
            %request_id,
            cache,
            "client request error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::application::error::HttpError;

    async fn failing() -> Result<(), HttpError> {
        Err(HttpError::new(
            "test",
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
            "inventory offline",
        ))
    }

    #[tokio::test]
    async fn error_report_is_consumed_by_the_logger() {
        let router = Router::new()
            .route("/", get(failing))
            .layer(middleware::from_fn(log_responses))
            .layer(middleware::from_fn(set_request_context));

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("router is infallible");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<ErrorReport>().is_none());
    }
}
