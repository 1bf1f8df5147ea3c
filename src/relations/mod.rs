//! Association declaration, resolution, and per-record caching

pub mod associated;
pub mod category;
pub mod counter;
pub mod manager;
pub mod metadata;
pub mod runtime;

pub use associated::{AssociatedRecord, AssociatedRecords};
pub use category::{Category, CategoryRegistry};
pub use counter::{CounterCacheMaintainer, CounterSink};
pub use manager::RelationManager;
pub use metadata::{CounterCache, JoinMapping, Relation, RelationKind, ThroughRelation};
pub use runtime::RecordRelation;
