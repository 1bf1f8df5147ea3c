//! Per-model cache policy client
//!
//! One client per model decides, per finder method, whether results are
//! cached and whether a data change flushes the caches. Decisions come
//! from the global flags in [`CacheConfig`], inverted by the model's
//! per-method exception lists. The second-level cache is resolved from
//! the provider once and memoized, including a memoized "no cache"
//! answer.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::cache::store::{self, Cache, CacheProvider, NamedRequestCache};
use crate::config::CacheConfig;

/// Cache policy and access point for one model.
pub struct ModelCacheClient {
    model: String,
    use_request_cache: bool,
    use_second_level_cache: bool,
    flush_cache_on_change: bool,
    use_cache_exceptions: HashSet<String>,
    flush_cache_exceptions: HashSet<String>,
    provider: Option<Arc<dyn CacheProvider>>,
    second_level: OnceLock<Option<Arc<dyn Cache>>>,
    request_cache: NamedRequestCache,
}

impl ModelCacheClient {
    pub fn new(model: &str, config: &CacheConfig, provider: Option<Arc<dyn CacheProvider>>) -> Self {
        Self {
            model: model.to_string(),
            use_request_cache: config.use_request_cache,
            use_second_level_cache: config.use_second_level_cache,
            flush_cache_on_change: config.flush_cache_on_change,
            use_cache_exceptions: config.use_cache_exceptions_for(model),
            flush_cache_exceptions: config.flush_cache_exceptions_for(model),
            provider,
            second_level: OnceLock::new(),
            request_cache: NamedRequestCache::new(model),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether results of a finder method are cached. The global flag,
    /// inverted when the method is listed as an exception.
    pub fn use_cache(&self, method: &str) -> bool {
        let base = self.use_request_cache || self.use_second_level_cache;
        if self.use_cache_exceptions.contains(method) {
            !base
        } else {
            base
        }
    }

    /// Whether a change through a method flushes the model's caches. The
    /// global flag, inverted when the method is listed as an exception.
    pub fn flush_cache(&self, method: &str) -> bool {
        if self.flush_cache_exceptions.contains(method) {
            !self.flush_cache_on_change
        } else {
            self.flush_cache_on_change
        }
    }

    /// Cache key for a request against this model.
    pub fn cache_key(&self, request: &str, elements: &[&str]) -> String {
        store::cache_key(&self.model, request, elements)
    }

    /// Reads a cached value, request cache first, then second level.
    pub fn get_data(&self, method: &str, key: &str) -> Option<Value> {
        if !self.use_cache(method) {
            return None;
        }
        if self.use_request_cache {
            if let Some(value) = self.request_cache.get(key) {
                tracing::trace!(model = %self.model, key, "request cache hit");
                return Some(value);
            }
        }
        if self.use_second_level_cache {
            if let Some(cache) = self.second_level_cache() {
                if let Some(value) = cache.get(key) {
                    tracing::trace!(model = %self.model, key, "second-level cache hit");
                    return Some(value);
                }
            }
        }
        None
    }

    /// Stores a value in every enabled cache tier.
    pub fn put_data(&self, method: &str, key: &str, value: Value) {
        if !self.use_cache(method) {
            return;
        }
        if self.use_request_cache {
            self.request_cache.put(key, value.clone());
        }
        if self.use_second_level_cache {
            if let Some(cache) = self.second_level_cache() {
                cache.put(key, value);
            }
        }
    }

    /// Reacts to a data change through a method, flushing if the policy
    /// says so.
    pub fn on_change(&self, method: &str) {
        if self.flush_cache(method) {
            tracing::debug!(model = %self.model, method, "flushing caches on change");
            self.clear_cache();
        }
    }

    /// Drops everything cached for this model in both tiers.
    pub fn clear_cache(&self) {
        self.request_cache.clear();
        if let Some(cache) = self.second_level_cache() {
            cache.clear();
        }
    }

    /// The model's second-level cache, resolved from the provider once.
    fn second_level_cache(&self) -> Option<Arc<dyn Cache>> {
        self.second_level
            .get_or_init(|| {
                self.provider
                    .as_ref()
                    .and_then(|provider| provider.get_cache(&self.model))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{clear_request_caches, InMemoryCacheProvider};
    use serde_json::json;

    fn config_with_exception(model: &str, method: &str) -> CacheConfig {
        let mut config = CacheConfig::default();
        config
            .use_cache_exceptions
            .entry(model.to_string())
            .or_default()
            .insert(method.to_string());
        config
    }

    #[test]
    fn exceptions_invert_the_global_flags() {
        let config = config_with_exception("post", "find_all");
        let client = ModelCacheClient::new("post", &config, None);

        assert!(client.use_cache("find_first"));
        assert!(!client.use_cache("find_all"));

        let mut config = CacheConfig::default();
        config.use_request_cache = false;
        config
            .use_cache_exceptions
            .entry("post".to_string())
            .or_default()
            .insert("find_all".to_string());
        let client = ModelCacheClient::new("post", &config, None);
        assert!(!client.use_cache("find_first"));
        assert!(client.use_cache("find_all"));
    }

    #[test]
    fn request_cache_round_trip() {
        clear_request_caches();
        let client = ModelCacheClient::new("post", &CacheConfig::default(), None);
        let key = client.cache_key("find_first", &["id=1"]);
        assert_eq!(key, "post.find_first.id=1");

        assert!(client.get_data("find_first", &key).is_none());
        client.put_data("find_first", &key, json!({"id": 1}));
        assert_eq!(client.get_data("find_first", &key), Some(json!({"id": 1})));
        clear_request_caches();
    }

    #[test]
    fn uncached_methods_bypass_both_tiers() {
        clear_request_caches();
        let config = config_with_exception("post", "find_all");
        let client = ModelCacheClient::new("post", &config, None);
        let key = client.cache_key("find_all", &[]);

        client.put_data("find_all", &key, json!(1));
        assert!(client.get_data("find_all", &key).is_none());
        // The same key stays readable for non-excepted methods.
        client.put_data("find_first", &key, json!(1));
        assert_eq!(client.get_data("find_first", &key), Some(json!(1)));
        clear_request_caches();
    }

    #[test]
    fn second_level_cache_comes_from_the_provider() {
        clear_request_caches();
        let mut config = CacheConfig::default();
        config.use_request_cache = false;
        config.use_second_level_cache = true;

        let provider = Arc::new(InMemoryCacheProvider::new());
        let client = ModelCacheClient::new(
            "post",
            &config,
            Some(Arc::clone(&provider) as Arc<dyn CacheProvider>),
        );

        let key = client.cache_key("find_first", &["id=1"]);
        client.put_data("find_first", &key, json!(7));

        let shared = provider.get_cache("post").unwrap();
        assert_eq!(shared.get(&key), Some(json!(7)));
    }

    #[test]
    fn change_flushes_unless_excepted() {
        clear_request_caches();
        let mut config = CacheConfig::default();
        config
            .flush_cache_exceptions
            .entry("post".to_string())
            .or_default()
            .insert("touch".to_string());
        let client = ModelCacheClient::new("post", &config, None);

        let key = client.cache_key("find_first", &["id=1"]);
        client.put_data("find_first", &key, json!(1));

        client.on_change("touch");
        assert_eq!(client.get_data("find_first", &key), Some(json!(1)));

        client.on_change("update");
        assert!(client.get_data("find_first", &key).is_none());
        clear_request_caches();
    }
}
