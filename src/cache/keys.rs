//! Cache key construction.
//!
//! A key identifies one cacheable read: a namespace naming the logical
//! resource plus the request's parameter set. Parameter order never affects
//! the key.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};
use url::form_urlencoded;
use uuid::Uuid;

use crate::domain::EntityKind;

/// Suffix of the refresh-mutex marker stored next to an entry.
const REFRESH_SUFFIX: &str = "refresh";

/// Normalized request parameters, ordered by name.
pub type ParamMap = BTreeMap<String, String>;

/// Resolved cache key, `"{namespace}"` or `"{namespace}:{digest}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the marker guarding background refreshes of this entry.
    pub fn refresh_marker(&self) -> String {
        format!("{}:{REFRESH_SUFFIX}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds the key for `namespace` and `params`.
///
/// An empty parameter set yields the bare namespace.
pub fn build_key(namespace: &str, params: &ParamMap) -> CacheKey {
    if params.is_empty() {
        return CacheKey(namespace.to_string());
    }

    let canonical = canonical_query(params);
    let digest = Sha256::digest(canonical.as_bytes());
    CacheKey(format!("{}{}", namespace_scope(namespace), hex::encode(digest)))
}

/// Serializes parameters as `application/x-www-form-urlencoded`, sorted by
/// name.
pub fn canonical_query(params: &ParamMap) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Normalizes raw `(name, value)` pairs.
///
/// Values are trimmed and empty ones dropped. A repeated name keeps its
/// last value.
pub fn normalize_params<I, K, V>(pairs: I) -> ParamMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut params = ParamMap::new();
    for (name, value) in pairs {
        let name = name.as_ref().trim();
        let value = value.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        if value.is_empty() {
            params.remove(name);
            continue;
        }
        params.insert(name.to_string(), value.to_string());
    }
    params
}

/// Parses a raw query string into normalized parameters.
pub fn params_from_query(query: Option<&str>) -> ParamMap {
    match query {
        Some(query) => normalize_params(form_urlencoded::parse(query.as_bytes())),
        None => ParamMap::new(),
    }
}

/// Prefix shared by every parameterised key of `namespace`.
pub fn namespace_scope(namespace: &str) -> String {
    format!("{namespace}:")
}

/// Namespace of the listing endpoint for `kind`.
pub fn listing_namespace(kind: EntityKind) -> String {
    kind.collection().to_string()
}

/// Namespace of the detail endpoint for one entity.
pub fn detail_namespace(kind: EntityKind, id: Uuid) -> String {
    format!("{}/{id}", kind.collection())
}

/// Prefix shared by the detail namespaces of every entity of `kind`.
pub fn detail_prefix(kind: EntityKind) -> String {
    format!("{}/", kind.collection())
}
