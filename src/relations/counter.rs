//! Counter-cache maintenance
//!
//! When a child record of a counter-cached belongs-to relation is created
//! or deleted, the parent's counter column moves by exactly one. The
//! maintainer computes which parent rows and columns to touch; applying
//! the adjustment is the [`CounterSink`]'s concern.

use crate::error::OrmResult;
use crate::model::{FieldMap, Record};
use crate::relations::manager::RelationManager;
use crate::relations::metadata::RelationKind;

/// Applies counter adjustments to the parent model's storage.
///
/// `key` identifies the parent row by its target-side join columns.
pub trait CounterSink: Send + Sync {
    fn adjust_counter(&self, model: &str, key: &FieldMap, column: &str, delta: i64) -> OrmResult<()>;
}

/// Propagates child create/delete events into parent counter columns.
pub struct CounterCacheMaintainer {
    relations: RelationManager,
}

impl CounterCacheMaintainer {
    pub fn new(relations: RelationManager) -> Self {
        Self { relations }
    }

    /// Increments every counter-cached parent of a newly created child.
    pub fn record_created(&self, child: &Record, sink: &dyn CounterSink) -> OrmResult<()> {
        self.adjust(child, 1, sink)
    }

    /// Decrements every counter-cached parent of a deleted child.
    pub fn record_deleted(&self, child: &Record, sink: &dyn CounterSink) -> OrmResult<()> {
        self.adjust(child, -1, sink)
    }

    fn adjust(&self, child: &Record, delta: i64, sink: &dyn CounterSink) -> OrmResult<()> {
        for relation in self.relations.relations_of(child.model()) {
            if relation.kind() != RelationKind::BelongsTo {
                continue;
            }
            let Some(counter) = relation.counter_cache() else {
                continue;
            };

            // The parent key comes from the child's foreign-key columns.
            // A child without a complete key has no parent row to adjust.
            let mut key = FieldMap::new();
            let mut complete = true;
            for (owner_column, target_column) in relation.mapping().pairs() {
                match child.field(owner_column) {
                    Some(value) => {
                        key.insert(target_column.clone(), value.clone());
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                tracing::warn!(
                    child = child.model(),
                    association = relation.association_id(),
                    "skipping counter adjustment, child has incomplete key"
                );
                continue;
            }

            tracing::debug!(
                parent = relation.target_model(),
                column = %counter.column,
                delta,
                "adjusting counter cache"
            );
            sink.adjust_counter(relation.target_model(), &key, &counter.column, delta)?;
        }
        Ok(())
    }
}
