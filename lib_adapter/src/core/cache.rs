//! # Response Cache Contract
//!
//! The cache itself is an external collaborator; this module pins down the
//! interface the refresh paths write through and the foreground path reads
//! from, the canonical fingerprinting of request parameters, and a
//! mutex-guarded in-memory implementation used by the server binary and the
//! tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::core::response::AdapterResponse;

/// Canonical fingerprint of a set of request parameters.
///
/// Parameters are routed through `serde_json::Value` before rendering so that
/// every producer (typed structs on the request path, raw values on the cache
/// write path) yields byte-identical fingerprints for identical parameters.
pub fn fingerprint<T: Serialize>(params: &T) -> String {
    let value = serde_json::to_value(params).expect("request parameters serialize to JSON");
    value.to_string()
}

/// Cache key for `params` relative to a named data source.
pub fn cache_key(source: &str, fingerprint: &str) -> String {
    format!("{}:{}", source, fingerprint)
}

/// One upsert handed to [`ResponseCache::write`].
pub struct CacheEntry {
    /// The canonical request parameters the response answers.
    pub params: Value,
    /// The full response payload, timestamps included.
    pub response: AdapterResponse,
}

/// Write/read contract between the refresh machinery and the response store.
///
/// Capacity and TTL management belong to the implementation, not to the
/// adapter core.
pub trait ResponseCache: Send + Sync {
    /// Idempotently upserts one entry per `(source, fingerprint-of-params)`,
    /// overwriting any prior value.
    fn write(&self, source: &str, entries: Vec<CacheEntry>);

    /// Reads the entry stored under `key` (see [`cache_key`]).
    fn read(&self, key: &str) -> Option<AdapterResponse>;
}

/// In-memory [`ResponseCache`] backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryCache {
    map: Mutex<HashMap<String, AdapterResponse>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.lock().expect("cache lock poisoned").len()
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn write(&self, source: &str, entries: Vec<CacheEntry>) {
        let mut map = self.map.lock().expect("cache lock poisoned");
        for entry in entries {
            let key = cache_key(source, &fingerprint(&entry.params));
            map.insert(key, entry.response);
        }
    }

    fn read(&self, key: &str) -> Option<AdapterResponse> {
        self.map.lock().expect("cache lock poisoned").get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_is_deterministic_across_producers() {
        #[derive(Serialize)]
        struct Pair {
            base: String,
            quote: String,
        }
        let typed = Pair {
            base: "ETH".into(),
            quote: "USD".into(),
        };
        let raw = json!({"base": "ETH", "quote": "USD"});
        assert_eq!(fingerprint(&typed), fingerprint(&raw));
    }

    #[test]
    fn write_then_read_roundtrips_under_the_derived_key() {
        let cache = MemoryCache::new();
        let params = json!({"base": "ETH", "quote": "USD"});
        cache.write(
            "gemini_wss",
            vec![CacheEntry {
                params: params.clone(),
                response: AdapterResponse::error(502, "boom"),
            }],
        );
        let key = cache_key("gemini_wss", &fingerprint(&params));
        let stored = cache.read(&key).expect("entry present");
        assert_eq!(stored.status_code, 502);
        assert!(cache.read("gemini_wss:{}").is_none());
    }

    #[test]
    fn rewrite_overwrites_the_prior_value() {
        let cache = MemoryCache::new();
        let params = json!([{"address": "0xabc"}]);
        for message in ["first", "second"] {
            cache.write(
                "balance_rpc",
                vec![CacheEntry {
                    params: params.clone(),
                    response: AdapterResponse::error(502, message),
                }],
            );
        }
        let key = cache_key("balance_rpc", &fingerprint(&params));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.read(&key).unwrap().error_message.as_deref(),
            Some("second")
        );
    }
}
