//! Per-owner association caches
//!
//! One wrapper per (owner record, association): [`AssociatedRecord`] for
//! singular relations, [`AssociatedRecords`] for collections. Each wrapper
//! distinguishes "never fetched" from "fetched, and the answer was empty" so
//! a stored null foreign key or an empty collection is a valid cached state
//! that suppresses further fetches. Refreshes replace contents in place;
//! holders of the wrapper observe the new data without re-resolving.

use crate::model::Record;

/// Cached result of a singular association fetch.
#[derive(Debug, Clone, Default)]
pub struct AssociatedRecord {
    owner_model: String,
    association_id: String,
    record: Option<Record>,
    has_loaded_from_database: bool,
}

impl AssociatedRecord {
    pub(crate) fn empty(owner_model: &str, association_id: &str) -> Self {
        Self {
            owner_model: owner_model.to_string(),
            association_id: association_id.to_string(),
            record: None,
            has_loaded_from_database: false,
        }
    }

    /// Wraps an already-known result, marking it loaded. A `None` here is
    /// a definitive empty answer, not an unfetched state.
    pub(crate) fn with_record(owner_model: &str, association_id: &str, record: Option<Record>) -> Self {
        Self {
            owner_model: owner_model.to_string(),
            association_id: association_id.to_string(),
            record,
            has_loaded_from_database: true,
        }
    }

    pub fn owner_model(&self) -> &str {
        &self.owner_model
    }

    pub fn association_id(&self) -> &str {
        &self.association_id
    }

    /// The cached associated record, if the fetch found one.
    pub fn record(&self) -> Option<&Record> {
        self.record.as_ref()
    }

    /// True once a fetch result (possibly empty) has been stored.
    pub fn has_loaded_from_database(&self) -> bool {
        self.has_loaded_from_database
    }

    /// Stores a fetch result, replacing any previous contents.
    pub(crate) fn store_loaded_record(&mut self, record: Option<Record>) {
        self.record = record;
        self.has_loaded_from_database = true;
    }
}

/// Cached result of a collection association fetch.
#[derive(Debug, Clone, Default)]
pub struct AssociatedRecords {
    owner_model: String,
    association_id: String,
    records: Vec<Record>,
    has_loaded_from_database: bool,
}

impl AssociatedRecords {
    pub(crate) fn empty(owner_model: &str, association_id: &str) -> Self {
        Self {
            owner_model: owner_model.to_string(),
            association_id: association_id.to_string(),
            records: Vec::new(),
            has_loaded_from_database: false,
        }
    }

    pub(crate) fn with_records(owner_model: &str, association_id: &str, records: Vec<Record>) -> Self {
        Self {
            owner_model: owner_model.to_string(),
            association_id: association_id.to_string(),
            records,
            has_loaded_from_database: true,
        }
    }

    pub fn owner_model(&self) -> &str {
        &self.owner_model
    }

    pub fn association_id(&self) -> &str {
        &self.association_id
    }

    /// The cached records, in fetch order followed by local additions.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once a fetch result (possibly empty) has been stored.
    pub fn has_loaded_from_database(&self) -> bool {
        self.has_loaded_from_database
    }

    /// Stores a fetch result, discarding all previous contents atomically.
    pub(crate) fn store_loaded_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.has_loaded_from_database = true;
    }

    /// Appends a locally created record without touching the loaded flag,
    /// so an unsaved owner can accumulate children before any fetch.
    pub fn add(&mut self, record: Record) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn empty_answer_counts_as_loaded() {
        let mut cache = AssociatedRecord::empty("invoice", "order");
        assert!(!cache.has_loaded_from_database());

        cache.store_loaded_record(None);
        assert!(cache.has_loaded_from_database());
        assert!(cache.record().is_none());
    }

    #[test]
    fn refresh_replaces_contents_in_place() {
        let mut cache =
            AssociatedRecords::with_records("order", "line_items", vec![record("line_item", &[("id", 1)])]);
        cache.store_loaded_records(vec![
            record("line_item", &[("id", 2)]),
            record("line_item", &[("id", 3)]),
        ]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.records()[0].i64_field("id"), 2);
    }

    #[test]
    fn local_additions_do_not_mark_loaded() {
        let mut cache = AssociatedRecords::empty("order", "line_items");
        cache.add(record("line_item", &[("id", 9)]));
        assert_eq!(cache.len(), 1);
        assert!(!cache.has_loaded_from_database());
    }
}
