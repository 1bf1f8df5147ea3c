//! Per-record association resolution
//!
//! A [`RecordRelation`] binds a declared relation to one owner record's
//! lifetime and decides, per call, whether the cached association data is
//! still usable or a fetch is due. The cached wrapper is shared: refreshes
//! replace its contents in place, so earlier holders observe new data
//! without re-resolving.
//!
//! Resolution order per call:
//! 1. Unless a refresh is forced, a cache loaded under the same option
//!    string is returned as-is.
//! 2. An unsaved owner resolves to its placeholder without touching the
//!    finder; locally added children stay visible.
//! 3. A missing key value on the owner is a definitive empty answer,
//!    stored as loaded without a fetch.
//! 4. Otherwise the target finder runs with the key filter and the
//!    relation's properties merged under the caller's options.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::model::{FieldMap, ModelRegistry, Record};
use crate::query::options::QueryOptions;
use crate::relations::associated::{AssociatedRecord, AssociatedRecords};
use crate::relations::metadata::Relation;

/// Association runtime bound to one owner record.
pub struct RecordRelation {
    relation: Arc<Relation>,
    models: ModelRegistry,
    last_used_options: Option<String>,
    one: Option<Arc<RwLock<AssociatedRecord>>>,
    many: Option<Arc<RwLock<AssociatedRecords>>>,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordRelation {
    pub(crate) fn new(relation: Arc<Relation>, models: ModelRegistry) -> Self {
        Self {
            relation,
            models,
            last_used_options: None,
            one: None,
            many: None,
        }
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Resolves a singular association (belongs-to or has-one).
    ///
    /// The returned wrapper is the same shared cache across calls; only
    /// its contents change on refresh.
    pub fn associated_record(
        &mut self,
        owner: &Record,
        options: &str,
        refresh: bool,
    ) -> OrmResult<Arc<RwLock<AssociatedRecord>>> {
        if self.relation.kind().is_collection() {
            return Err(OrmError::WrongRecordType(format!(
                "association '{}' on model '{}' is a collection, use associated_records()",
                self.relation.association_id(),
                self.relation.owner_model()
            )));
        }
        self.check_owner(owner)?;

        let cache = self.singular_cache();

        if !refresh && self.options_unchanged(options) && read_lock(&cache).has_loaded_from_database()
        {
            tracing::trace!(
                owner = self.relation.owner_model(),
                association = self.relation.association_id(),
                "serving association from cache"
            );
            return Ok(cache);
        }

        if owner.is_new_record() {
            return Ok(cache);
        }

        match self.key_filter(owner) {
            None => {
                write_lock(&cache).store_loaded_record(None);
            }
            Some(filter) => {
                let merged = self.merged_options(options)?;
                let finder = self.models.finder(self.relation.target_model())?;
                let record = finder.find_first(&filter, &merged)?;
                tracing::debug!(
                    owner = self.relation.owner_model(),
                    association = self.relation.association_id(),
                    found = record.is_some(),
                    "fetched singular association"
                );
                write_lock(&cache).store_loaded_record(record);
            }
        }
        self.last_used_options = Some(options.to_string());
        Ok(cache)
    }

    /// Resolves a collection association (has-many or has-many-through).
    pub fn associated_records(
        &mut self,
        owner: &Record,
        options: &str,
        refresh: bool,
    ) -> OrmResult<Arc<RwLock<AssociatedRecords>>> {
        if !self.relation.kind().is_collection() {
            return Err(OrmError::WrongRecordType(format!(
                "association '{}' on model '{}' is singular, use associated_record()",
                self.relation.association_id(),
                self.relation.owner_model()
            )));
        }
        self.check_owner(owner)?;

        let cache = self.collection_cache();

        if !refresh && self.options_unchanged(options) && read_lock(&cache).has_loaded_from_database()
        {
            tracing::trace!(
                owner = self.relation.owner_model(),
                association = self.relation.association_id(),
                "serving association from cache"
            );
            return Ok(cache);
        }

        if owner.is_new_record() {
            return Ok(cache);
        }

        match self.key_filter(owner) {
            None => {
                write_lock(&cache).store_loaded_records(Vec::new());
            }
            Some(filter) => {
                let merged = self.merged_options(options)?;
                let finder = self.models.finder(self.relation.target_model())?;
                let records = finder.find_all(&filter, &merged)?;
                tracing::debug!(
                    owner = self.relation.owner_model(),
                    association = self.relation.association_id(),
                    count = records.len(),
                    "fetched collection association"
                );
                write_lock(&cache).store_loaded_records(records);
            }
        }
        self.last_used_options = Some(options.to_string());
        Ok(cache)
    }

    fn check_owner(&self, owner: &Record) -> OrmResult<()> {
        if owner.model() != self.relation.owner_model() {
            return Err(OrmError::WrongRecordType(format!(
                "association '{}' belongs to model '{}', got a '{}' record",
                self.relation.association_id(),
                self.relation.owner_model(),
                owner.model()
            )));
        }
        Ok(())
    }

    fn options_unchanged(&self, options: &str) -> bool {
        self.last_used_options.as_deref() == Some(options)
    }

    fn singular_cache(&mut self) -> Arc<RwLock<AssociatedRecord>> {
        let relation = &self.relation;
        Arc::clone(self.one.get_or_insert_with(|| {
            Arc::new(RwLock::new(AssociatedRecord::empty(
                relation.owner_model(),
                relation.association_id(),
            )))
        }))
    }

    fn collection_cache(&mut self) -> Arc<RwLock<AssociatedRecords>> {
        let relation = &self.relation;
        Arc::clone(self.many.get_or_insert_with(|| {
            Arc::new(RwLock::new(AssociatedRecords::empty(
                relation.owner_model(),
                relation.association_id(),
            )))
        }))
    }

    /// Builds the target-side filter from the owner's key values.
    ///
    /// Returns `None` when any owner-side column is absent or null, which
    /// resolves to a definitive empty answer without a fetch. Through
    /// relations carry middle-table-qualified filter keys.
    fn key_filter(&self, owner: &Record) -> Option<FieldMap> {
        let mut filter = FieldMap::new();
        for (owner_column, target_column) in self.relation.mapping().pairs() {
            let value = owner.field(owner_column)?;
            filter.insert(target_column.clone(), value.clone());
        }
        Some(filter)
    }

    /// Relation properties merged under caller options, caller winning.
    /// A through relation additionally carries the conditions of both of
    /// its legs, AND-concatenated.
    fn merged_options(&self, options: &str) -> OrmResult<QueryOptions> {
        let caller = QueryOptions::parse(options)?;
        let mut merged = self.relation.properties().merge(&caller);

        if let Some(through) = self.relation.through() {
            let mut conditions: Vec<String> = Vec::new();
            let mut data: Vec<(String, Value)> = Vec::new();
            for leg in [through.ac.properties(), through.cb.properties()] {
                if let Some(sql) = &leg.conditions_sql {
                    conditions.push(format!("({})", sql));
                }
                data.extend(leg.conditions_data.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            if let Some(sql) = &merged.conditions_sql {
                conditions.push(format!("({})", sql));
            }
            if !conditions.is_empty() {
                merged.conditions_sql = Some(conditions.join(" AND "));
            }
            for (key, value) in data {
                merged.conditions_data.entry(key).or_insert(value);
            }
        }

        Ok(merged)
    }
}
