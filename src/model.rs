//! Record values, the finder surface, and the model registry
//!
//! Records are dynamic field maps rather than static structs: the engine
//! resolves associations between models that are only known by name at
//! runtime. Each registered model contributes its column set (used to
//! validate join mappings at registration time) and a [`Finder`]
//! implementation, the query surface the association runtime delegates
//! fetches to. The registry replaces reflective class lookups with an
//! explicit name -> capability mapping populated at startup.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::query::options::QueryOptions;

/// Column name -> value map, used both for record fields and fetch filters.
pub type FieldMap = HashMap<String, Value>;

/// A dynamic record instance of a registered model.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: String,
    fields: FieldMap,
    new_record: bool,
}

impl Record {
    /// Creates a new, unsaved record with no fields set.
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            fields: FieldMap::new(),
            new_record: true,
        }
    }

    /// Creates a record hydrated from storage. Not a new record.
    pub fn from_fields(model: &str, fields: FieldMap) -> Self {
        Self {
            model: model.to_string(),
            fields,
            new_record: false,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// True until the record has been persisted.
    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    /// Marks the record as persisted.
    pub fn mark_persisted(&mut self) {
        self.new_record = false;
    }

    /// Returns the field value, treating JSON null the same as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Reads an integer field, defaulting to zero when absent.
    pub fn i64_field(&self, name: &str) -> i64 {
        self.field(name).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Adds `delta` to an integer field, used for counter columns.
    pub fn adjust_i64_field(&mut self, name: &str, delta: i64) {
        let next = self.i64_field(name) + delta;
        self.set_field(name, Value::from(next));
    }
}

/// Query surface of a model, consumed from the delegated execution layer.
///
/// Fetches are synchronous and blocking; retries and timeouts, if any, are
/// this collaborator's concern.
pub trait Finder: Send + Sync {
    /// Returns the first record matching the filter, or `None`.
    fn find_first(&self, filter: &FieldMap, options: &QueryOptions) -> OrmResult<Option<Record>>;

    /// Returns all records matching the filter, in fetch order.
    fn find_all(&self, filter: &FieldMap, options: &QueryOptions) -> OrmResult<Vec<Record>>;

    /// Runs a raw query with named parameters.
    fn find_all_by_sql(&self, sql: &str, params: &FieldMap) -> OrmResult<Vec<Record>>;
}

/// Registered capability of one model: its column set and finder.
#[derive(Clone)]
pub struct ModelEntry {
    columns: Vec<String>,
    finder: Arc<dyn Finder>,
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl ModelEntry {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn finder(&self) -> Arc<dyn Finder> {
        Arc::clone(&self.finder)
    }
}

/// Name -> model capability registry, populated at startup.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Arc<DashMap<String, ModelEntry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model with its column set and finder.
    pub fn register(&self, model: &str, columns: &[&str], finder: Arc<dyn Finder>) {
        tracing::debug!(model, columns = columns.len(), "registering model");
        self.models.insert(
            model.to_string(),
            ModelEntry {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                finder,
            },
        );
    }

    pub fn is_registered(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn entry(&self, model: &str) -> OrmResult<ModelEntry> {
        self.models
            .get(model)
            .map(|e| e.clone())
            .ok_or_else(|| OrmError::UnregisteredModel(model.to_string()))
    }

    pub fn finder(&self, model: &str) -> OrmResult<Arc<dyn Finder>> {
        Ok(self.entry(model)?.finder())
    }

    /// Checks whether the model declares the column.
    ///
    /// Qualified columns (`table.column`) are matched on the column part,
    /// as composed through-mappings qualify target columns by table.
    pub fn has_column(&self, model: &str, column: &str) -> OrmResult<bool> {
        let entry = self.entry(model)?;
        let bare = column.rsplit('.').next().unwrap_or(column);
        Ok(entry.columns.iter().any(|c| c == bare))
    }
}
