//! Query-result caching: stores, keys, and per-model policy

pub mod client;
pub mod store;

pub use client::ModelCacheClient;
pub use store::{
    cache_key, clear_request_caches, Cache, CacheProvider, InMemoryCache, InMemoryCacheProvider,
    NamedRequestCache,
};
