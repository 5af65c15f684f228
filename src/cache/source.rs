//! Boundary between the cache and whatever computes responses.

use async_trait::async_trait;
use axum::http::{StatusCode, header::CONTENT_TYPE};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use super::codec::HeaderValues;
use super::keys::{CacheKey, ParamMap, build_key};

/// One cacheable read: the resource namespace and its normalized parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub namespace: String,
    pub params: ParamMap,
}

impl CacheRequest {
    pub fn new(namespace: impl Into<String>, params: ParamMap) -> Self {
        Self {
            namespace: namespace.into(),
            params,
        }
    }

    pub fn key(&self) -> CacheKey {
        build_key(&self.namespace, &self.params)
    }
}

/// Response produced by a [`ResponseSource`].
#[derive(Debug, Clone)]
pub struct SourceResponse {
    pub status: StatusCode,
    pub headers: HeaderValues,
    pub content: Bytes,
}

impl SourceResponse {
    /// Serializes `body` as a JSON response with `status`.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Result<Self, SourceError> {
        let content = serde_json::to_vec(body)?;
        let headers = HeaderValues::from([(
            CONTENT_TYPE.as_str().to_string(),
            vec!["application/json".to_string()],
        )]);
        Ok(Self {
            status,
            headers,
            content: Bytes::from(content),
        })
    }

    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("response source unavailable: {0}")]
    Unavailable(String),
    #[error("response could not be serialized")]
    Serialization(#[from] serde_json::Error),
}

impl SourceError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Computes the response for a cacheable read.
///
/// Implementations must be deterministic for a given request and data
/// state; the cache never looks inside the payload.
#[async_trait]
pub trait ResponseSource: Send + Sync {
    async fn compute(&self, request: &CacheRequest) -> Result<SourceResponse, SourceError>;
}
