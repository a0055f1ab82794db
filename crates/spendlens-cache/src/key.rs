//! Deterministic cache key derivation
//!
//! A key is the truncated SHA-256 of `operation:canonical-params`, where the
//! parameters are rendered as JSON with object keys sorted at every level.
//! Equal `(operation, params)` pairs always map to the same key regardless of
//! the order in which parameters were inserted.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of digest bytes kept; the key is twice this many hex characters
const KEY_BYTES: usize = 8;

/// Named parameters that identify a cached operation
///
/// # Examples
/// ```
/// use spendlens_cache::{CacheParams, cache_key};
///
/// let a = CacheParams::new().with("a", 1).with("b", 2);
/// let b = CacheParams::new().with("b", 2).with("a", 1);
/// assert_eq!(cache_key("f", &a), cache_key("f", &b));
/// assert_eq!(cache_key("f", &a).len(), 16);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheParams(BTreeMap<String, Value>);

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical JSON rendering with keys sorted at every nesting level
    ///
    /// serde_json's default `Map` is ordered by key, so a plain render of the
    /// parameters is already canonical.
    pub fn canonical(&self) -> String {
        let object: Map<String, Value> = self
            .0
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Value::Object(object).to_string()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for CacheParams {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Derive the cache key for `operation` with `params`
pub fn cache_key(operation: &str, params: &CacheParams) -> String {
    let content = format!("{operation}:{}", params.canonical());
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..KEY_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_order_independent() {
        let forward: CacheParams = [("a", json!(1)), ("b", json!(2))].into_iter().collect();
        let reverse: CacheParams = [("b", json!(2)), ("a", json!(1))].into_iter().collect();
        assert_eq!(cache_key("f", &forward), cache_key("f", &reverse));
    }

    #[test]
    fn test_nested_objects_are_canonical() {
        let one = CacheParams::new().with("filter", json!({"z": 1, "a": [{"y": 2, "b": 3}]}));
        let two = CacheParams::new().with("filter", json!({"a": [{"b": 3, "y": 2}], "z": 1}));
        assert_eq!(one.canonical(), two.canonical());
        assert_eq!(one.canonical(), r#"{"filter":{"a":[{"b":3,"y":2}],"z":1}}"#);
    }

    #[test]
    fn test_key_distinguishes_operation_and_params() {
        let params = CacheParams::new().with("start", "2024-01-01");
        let base = cache_key("get_cost_and_usage", &params);
        assert_ne!(base, cache_key("get_account_info", &params));
        assert_ne!(
            base,
            cache_key("get_cost_and_usage", &CacheParams::new().with("start", "2024-02-01"))
        );
        assert_eq!(base.len(), 16);
        assert!(base.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
