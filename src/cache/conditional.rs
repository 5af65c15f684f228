//! `If-None-Match` handling.

use axum::http::{HeaderMap, header::IF_NONE_MATCH};

use super::codec::CacheEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The client already holds the current representation.
    NotModified,
    Proceed,
}

/// Compares the client's validator with the entry's ETag byte for byte.
pub fn evaluate(validator: Option<&str>, entry: Option<&CacheEntry>) -> Precondition {
    match (validator, entry) {
        (Some(validator), Some(entry)) if validator == entry.etag => Precondition::NotModified,
        _ => Precondition::Proceed,
    }
}

/// Extracts the `If-None-Match` value, ignoring non-visible-ASCII values.
pub fn if_none_match(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::HeaderValue;
    use bytes::Bytes;
    use time::OffsetDateTime;

    use super::*;
    use crate::cache::codec::HeaderValues;
    use crate::cache::freshness::FreshnessPolicy;

    fn entry() -> CacheEntry {
        let policy = FreshnessPolicy::new(Duration::from_secs(60), Duration::from_secs(120));
        CacheEntry::encode(
            Bytes::from_static(b"{\"data\":[]}"),
            HeaderValues::new(),
            &policy,
            OffsetDateTime::now_utc(),
        )
    }

    #[test]
    fn matching_validator_is_not_modified() {
        let entry = entry();
        assert_eq!(
            evaluate(Some(entry.etag.as_str()), Some(&entry)),
            Precondition::NotModified
        );
    }

    #[test]
    fn comparison_includes_the_quotes() {
        let entry = entry();
        let unquoted = entry.etag.trim_matches('"').to_string();
        assert_eq!(
            evaluate(Some(unquoted.as_str()), Some(&entry)),
            Precondition::Proceed
        );
        assert_eq!(evaluate(Some("W/\"abc\""), Some(&entry)), Precondition::Proceed);
    }

    #[test]
    fn missing_validator_or_entry_proceeds() {
        let entry = entry();
        assert_eq!(evaluate(None, Some(&entry)), Precondition::Proceed);
        assert_eq!(evaluate(Some("\"abc\""), None), Precondition::Proceed);
    }

    #[test]
    fn header_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(if_none_match(&headers), None);
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        assert_eq!(if_none_match(&headers), Some("\"abc\""));
    }
}
