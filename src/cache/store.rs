//! Cache stores
//!
//! Two tiers back the cache-policy client: a request-scoped store living
//! in thread-local state and torn down explicitly at request end, and an
//! optional second-level store obtained from a [`CacheProvider`]. Both
//! expose the same named key/value surface over JSON values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

/// Named key/value store for cached query results.
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value, returning the previous one if present.
    fn put(&self, key: &str, value: Value) -> Option<Value>;

    fn remove(&self, key: &str) -> Option<Value>;

    /// Drops every entry of this cache.
    fn clear(&self);
}

/// Source of second-level caches, one per model name.
pub trait CacheProvider: Send + Sync {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>>;
}

/// Composes a cache key from the model, the request kind, and the request
/// elements that make it unique.
pub fn cache_key(model: &str, request: &str, elements: &[&str]) -> String {
    let mut key = String::with_capacity(model.len() + request.len() + 16);
    key.push_str(model);
    key.push('.');
    key.push_str(request);
    for element in elements {
        key.push('.');
        key.push_str(element);
    }
    key
}

/// Process-wide in-memory cache on a concurrent map.
pub struct InMemoryCache {
    name: String,
    entries: DashMap<String, Value>,
}

impl InMemoryCache {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: DashMap::new(),
        }
    }
}

impl Cache for InMemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.clone())
    }

    fn put(&self, key: &str, value: Value) -> Option<Value> {
        self.entries.insert(key.to_string(), value)
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Provider that lazily creates one [`InMemoryCache`] per requested name.
#[derive(Default)]
pub struct InMemoryCacheProvider {
    caches: DashMap<String, Arc<InMemoryCache>>,
}

impl InMemoryCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheProvider for InMemoryCacheProvider {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryCache::new(name)))
            .clone();
        Some(cache)
    }
}

thread_local! {
    static REQUEST_CACHES: RefCell<HashMap<String, HashMap<String, Value>>> =
        RefCell::new(HashMap::new());
}

/// Request-scoped cache keyed by name in thread-local state.
///
/// Entries live until [`clear_request_caches`] runs at request teardown;
/// the handle itself carries no data and is freely cloneable.
#[derive(Debug, Clone)]
pub struct NamedRequestCache {
    name: String,
}

impl NamedRequestCache {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Cache for NamedRequestCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<Value> {
        REQUEST_CACHES.with(|caches| {
            caches
                .borrow()
                .get(&self.name)
                .and_then(|cache| cache.get(key).cloned())
        })
    }

    fn put(&self, key: &str, value: Value) -> Option<Value> {
        REQUEST_CACHES.with(|caches| {
            caches
                .borrow_mut()
                .entry(self.name.clone())
                .or_default()
                .insert(key.to_string(), value)
        })
    }

    fn remove(&self, key: &str) -> Option<Value> {
        REQUEST_CACHES.with(|caches| {
            caches
                .borrow_mut()
                .get_mut(&self.name)
                .and_then(|cache| cache.remove(key))
        })
    }

    fn clear(&self) {
        REQUEST_CACHES.with(|caches| {
            caches.borrow_mut().remove(&self.name);
        });
    }
}

/// Drops every request-scoped cache on the current thread. Called at
/// request teardown.
pub fn clear_request_caches() {
    REQUEST_CACHES.with(|caches| caches.borrow_mut().clear());
}
