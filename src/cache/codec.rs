//! Envelope stored for each cached response.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

use super::freshness::FreshnessPolicy;

/// Response headers as replayed on a hit, lower-case name to values.
pub type HeaderValues = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cache entry could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cache entry could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Cached response owned by the store under its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(with = "base64_content")]
    pub content: Bytes,
    pub headers: HeaderValues,
    pub etag: String,
    #[serde(with = "time::serde::timestamp")]
    pub cached_at: OffsetDateTime,
    /// Freshness window in seconds.
    pub max_age: u64,
    /// Stale window in seconds.
    pub stale_while_revalidate: u64,
}

impl CacheEntry {
    /// Builds an entry for a freshly computed response.
    pub fn encode(
        content: Bytes,
        headers: HeaderValues,
        policy: &FreshnessPolicy,
        now: OffsetDateTime,
    ) -> Self {
        let etag = compute_etag(&content);
        Self {
            content,
            headers,
            etag,
            cached_at: now,
            max_age: policy.freshness_window.as_secs(),
            stale_while_revalidate: policy.stale_window.as_secs(),
        }
    }

    pub fn decode(self) -> (Bytes, HeaderValues, String) {
        (self.content, self.headers, self.etag)
    }

    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(raw).map_err(CodecError::Decode)
    }

    /// `Cache-Control` value advertised for this entry.
    pub fn cache_control(&self) -> String {
        cache_control_value(self.max_age, self.stale_while_revalidate)
    }
}

/// Strong validator: quoted hex SHA-256 of the body.
pub fn compute_etag(content: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(content)))
}

pub(crate) fn cache_control_value(max_age: u64, stale_while_revalidate: u64) -> String {
    format!("public, max-age={max_age}, stale-while-revalidate={stale_while_revalidate}")
}

mod base64_content {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(content: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(content))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(D::Error::custom)
    }
}
