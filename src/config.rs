//! Engine configuration
//!
//! Holds the global cache flags and per-model exception lists consumed by
//! [`crate::cache::ModelCacheClient`]. Deserializable so applications can
//! load it from their configuration files.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Global caching policy plus per-model overrides.
///
/// The exception lists invert the corresponding global flag for the named
/// finder methods only: a method listed in `use_cache_exceptions` is not
/// cached when caching is globally on, and is cached when caching is
/// globally off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use a cache scoped to the current unit of work
    pub use_request_cache: bool,
    /// Use a shared cache resolved from the cache provider
    pub use_second_level_cache: bool,
    /// Clear the resolved cache when a record of the model changes
    pub flush_cache_on_change: bool,
    /// Model name -> finder methods excepted from the use-cache flag
    pub use_cache_exceptions: HashMap<String, HashSet<String>>,
    /// Model name -> finder methods excepted from the flush-on-change flag
    pub flush_cache_exceptions: HashMap<String, HashSet<String>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_request_cache: true,
            use_second_level_cache: false,
            flush_cache_on_change: true,
            use_cache_exceptions: HashMap::new(),
            flush_cache_exceptions: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Methods excepted from the use-cache flag for a model.
    pub fn use_cache_exceptions_for(&self, model: &str) -> HashSet<String> {
        self.use_cache_exceptions.get(model).cloned().unwrap_or_default()
    }

    /// Methods excepted from the flush-on-change flag for a model.
    pub fn flush_cache_exceptions_for(&self, model: &str) -> HashSet<String> {
        self.flush_cache_exceptions.get(model).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_favor_request_cache() {
        let config = CacheConfig::default();
        assert!(config.use_request_cache);
        assert!(!config.use_second_level_cache);
        assert!(config.flush_cache_on_change);
    }

    #[test]
    fn exception_lookup_is_per_model() {
        let mut config = CacheConfig::default();
        config
            .use_cache_exceptions
            .entry("post".to_string())
            .or_default()
            .insert("find_all".to_string());

        assert!(config.use_cache_exceptions_for("post").contains("find_all"));
        assert!(config.use_cache_exceptions_for("user").is_empty());
    }

    #[test]
    fn deserializes_with_partial_keys() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"use_second_level_cache": true}"#).unwrap();
        assert!(config.use_second_level_cache);
        assert!(config.use_request_cache);
    }
}
