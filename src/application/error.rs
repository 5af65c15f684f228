use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::application::catalog::MessageBody;
use crate::application::inventory::InventoryError;
use crate::application::repos::RepoError;
use crate::cache::{InvalidationError, SourceError};
use crate::{config::LoadError, domain::error::DomainError, infra::error::InfraError};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: String,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message: public_message.into(),
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = MessageBody::message(self.public_message);
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<SourceError> for HttpError {
    fn from(error: SourceError) -> Self {
        HttpError::from_error(
            "infra::http::source_error_to_http_error",
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
            &error,
        )
    }
}

impl From<InventoryError> for HttpError {
    fn from(error: InventoryError) -> Self {
        const SOURCE: &str = "infra::http::inventory_error_to_http_error";
        match &error {
            InventoryError::Domain(DomainError::NotFound { entity, .. }) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                format!("{} not found", capitalize(entity)),
                &error,
            ),
            InventoryError::Domain(DomainError::Validation { message }) => HttpError::from_error(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                message.clone(),
                &error,
            ),
            InventoryError::Domain(DomainError::Conflict { message }) => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                message.clone(),
                &error,
            ),
            InventoryError::Repo(RepoError::NotFound) => HttpError::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Resource not found",
                &error,
            ),
            InventoryError::Repo(_) => HttpError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                &error,
            ),
        }
    }
}

impl From<InvalidationError> for HttpError {
    fn from(error: InvalidationError) -> Self {
        HttpError::from_error(
            "infra::http::invalidation_error_to_http_error",
            StatusCode::SERVICE_UNAVAILABLE,
            "Cache could not be purged",
            &error,
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Process-level failures surfaced by `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
