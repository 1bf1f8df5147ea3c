//! # tether-orm: Association Resolution and Lazy Loading
//!
//! Engine for record-oriented data layers: declared relations between
//! dynamically named models (belongs-to, has-one, has-many, and
//! has-many-through), resolved lazily per owner record with per-record
//! caching, a canonical query-option set with a fluent builder and
//! pagination, a per-model cache-policy client over request-scoped and
//! second-level stores, and counter-cache maintenance for belongs-to
//! relations.
//!
//! Query execution itself is delegated: every model registers a
//! [`model::Finder`] and the engine decides when, and with which options,
//! a fetch runs.

pub mod cache;
pub mod config;
pub mod error;
pub mod inflect;
pub mod model;
pub mod query;
pub mod relations;

#[cfg(test)]
pub(crate) mod testing;

// Re-export core types
pub use cache::{Cache, CacheProvider, ModelCacheClient};
pub use config::CacheConfig;
pub use error::{OrmError, OrmResult};
pub use model::{FieldMap, Finder, ModelRegistry, Record};
pub use query::{JoinType, Paginator, QueryBuilder, QueryOptions};
pub use relations::{
    AssociatedRecord, AssociatedRecords, Category, CategoryRegistry, CounterCacheMaintainer,
    CounterSink, RecordRelation, Relation, RelationKind, RelationManager,
};
