//! Read-through cache for find-style operations
//!
//! Entries live under `{collection}/{canonical query}`. Writes never
//! invalidate entries: a read issued after a write may return the cached,
//! stale payload until the cache backend evicts it. Callers that cannot
//! tolerate this use [`Repository::without_cache`](crate::Repository::without_cache).

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CacheResult, RepositoryResult};

/// Cache collaborator contract
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> CacheResult<()>;
}

/// Process-local cache without eviction
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().await.remove(key)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> CacheResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Serialize a JSON value with object keys sorted at every level.
///
/// `bson` enables serde_json's `preserve_order`, so with the `mongodb`
/// feature a `Map` keeps insertion order and plain `to_string` is not stable.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Cache-aside accessor bound to one collection
#[derive(Clone, Copy)]
pub struct CacheAside<'a> {
    namespace: &'a str,
    cache: Option<&'a dyn Cache>,
}

impl<'a> CacheAside<'a> {
    pub fn new(namespace: &'a str, cache: Option<&'a dyn Cache>) -> Self {
        Self { namespace, cache }
    }

    /// `{collection}/{canonical query}`
    pub fn key(&self, query: &Value) -> String {
        format!("{}/{}", self.namespace, canonical_json(query))
    }

    /// Return the cached payload or run `loader` and cache what it yields.
    ///
    /// An absent result (`None`) is never cached.
    pub async fn read_through<F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> RepositoryResult<Option<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RepositoryResult<Option<Value>>>,
    {
        let Some(cache) = self.cache else {
            return loader().await;
        };

        if let Some(hit) = cache.get(key).await? {
            debug!(cache_key = %key, "Cache hit");
            return Ok(Some(hit));
        }

        debug!(cache_key = %key, "Cache miss");
        let loaded = loader().await?;
        if let Some(ref value) = loaded {
            cache.set(key, value.clone()).await?;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, RepositoryError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({ "b": 1, "a": { "y": [1, { "d": 1, "c": 2 }], "x": null } });
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"x":null,"y":[1,{"c":2,"d":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_canonical_json_ignores_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("b".to_string(), json!(1));
        first.insert("a".to_string(), json!(2));
        let mut second = serde_json::Map::new();
        second.insert("a".to_string(), json!(2));
        second.insert("b".to_string(), json!(1));

        assert_eq!(
            canonical_json(&Value::Object(first)),
            canonical_json(&Value::Object(second))
        );
    }

    #[test]
    fn test_key_is_namespaced() {
        let aside = CacheAside::new("people", None);
        assert_eq!(aside.key(&json!({ "a": 1 })), r#"people/{"a":1}"#);
    }

    #[tokio::test]
    async fn test_read_through_without_cache_always_loads() {
        let calls = AtomicUsize::new(0);
        let aside = CacheAside::new("people", None);

        for _ in 0..2 {
            aside
                .read_through("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!(1)))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_through_populates_then_hits() {
        let cache = MemoryCache::new();
        let calls = AtomicUsize::new(0);
        let aside = CacheAside::new("people", Some(&cache));

        for _ in 0..3 {
            let value = aside
                .read_through("people/k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!({ "name": "Alice" })))
                })
                .await
                .unwrap();
            assert_eq!(value, Some(json!({ "name": "Alice" })));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_absent_results_are_not_cached() {
        let cache = MemoryCache::new();
        let aside = CacheAside::new("people", Some(&cache));

        let value = aside
            .read_through("people/k", || async { Ok(None) })
            .await
            .unwrap();

        assert!(value.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_hit_skips_loader() {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .times(1)
            .returning(|_| Ok(Some(json!([1, 2]))));
        cache.expect_set().never();

        let calls = AtomicUsize::new(0);
        let aside = CacheAside::new("people", Some(&cache));
        let value = aside
            .read_through("people/k", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap();

        assert_eq!(value, Some(json!([1, 2])));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_failures_propagate() {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Err(CacheError::Backend("down".to_string())));

        let aside = CacheAside::new("people", Some(&cache));
        let result = aside.read_through("people/k", || async { Ok(None) }).await;

        assert!(matches!(result, Err(RepositoryError::Cache(_))));
    }
}
