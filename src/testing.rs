//! Shared test support: a programmable finder and fixture builders.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::OrmResult;
use crate::model::{FieldMap, Finder, ModelRegistry, Record};
use crate::query::options::QueryOptions;

/// Finder double that records every call and replays stubbed results.
#[derive(Default)]
pub struct MockFinder {
    first_result: Mutex<Option<Record>>,
    all_results: Mutex<Vec<Record>>,
    fetch_count: Mutex<usize>,
    last_filter: Mutex<Option<FieldMap>>,
    last_options: Mutex<Option<QueryOptions>>,
}

impl MockFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub_first(&self, record: Option<Record>) {
        *self.first_result.lock().unwrap() = record;
    }

    pub fn stub_all(&self, records: Vec<Record>) {
        *self.all_results.lock().unwrap() = records;
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }

    pub fn last_filter(&self) -> Option<FieldMap> {
        self.last_filter.lock().unwrap().clone()
    }

    pub fn last_options(&self) -> Option<QueryOptions> {
        self.last_options.lock().unwrap().clone()
    }

    fn record_call(&self, filter: &FieldMap, options: &QueryOptions) {
        *self.fetch_count.lock().unwrap() += 1;
        *self.last_filter.lock().unwrap() = Some(filter.clone());
        *self.last_options.lock().unwrap() = Some(options.clone());
    }
}

impl Finder for MockFinder {
    fn find_first(&self, filter: &FieldMap, options: &QueryOptions) -> OrmResult<Option<Record>> {
        self.record_call(filter, options);
        Ok(self.first_result.lock().unwrap().clone())
    }

    fn find_all(&self, filter: &FieldMap, options: &QueryOptions) -> OrmResult<Vec<Record>> {
        self.record_call(filter, options);
        Ok(self.all_results.lock().unwrap().clone())
    }

    fn find_all_by_sql(&self, _sql: &str, _params: &FieldMap) -> OrmResult<Vec<Record>> {
        *self.fetch_count.lock().unwrap() += 1;
        Ok(self.all_results.lock().unwrap().clone())
    }
}

/// Builds a persisted record with integer fields.
pub fn record(model: &str, fields: &[(&str, i64)]) -> Record {
    let fields: FieldMap = fields
        .iter()
        .map(|(name, value)| (name.to_string(), Value::from(*value)))
        .collect();
    Record::from_fields(model, fields)
}

/// Registers models with the given column sets, each backed by a fresh
/// mock finder.
pub fn registry_with_models(models: &[(&str, &[&str])]) -> ModelRegistry {
    let registry = ModelRegistry::new();
    for (model, columns) in models {
        registry.register(model, columns, Arc::new(MockFinder::new()));
    }
    registry
}

/// A small shop schema used across relation tests.
pub fn shop_models() -> ModelRegistry {
    registry_with_models(&[
        ("order", &["id", "items_total"]),
        ("invoice", &["id", "order_id"]),
        ("line_item", &["id", "order_id", "position"]),
        ("payment", &["id", "order_id"]),
        ("project", &["id"]),
        ("assignment", &["id", "project_id", "employee_id"]),
        ("employee", &["id"]),
    ])
}
