//! Relation registration and lookup
//!
//! The manager owns every declared relation, keyed by owner model and
//! association id. All configuration validation happens here, at
//! registration time: join mappings must reference columns registered on
//! both models, an explicit counter-cache column must exist on the target,
//! and both legs of a has-many-through relation must already be
//! registered. Fetch-time code can therefore trust the metadata blindly.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::inflect;
use crate::model::ModelRegistry;
use crate::query::options::{parse_option_pairs, QueryOptions};
use crate::relations::metadata::{
    CounterCache, JoinMapping, Relation, RelationKind, ThroughRelation,
};
use crate::relations::runtime::RecordRelation;

/// Registry of declared relations for all models.
#[derive(Clone)]
pub struct RelationManager {
    models: ModelRegistry,
    relations: Arc<DashMap<String, Arc<Relation>>>,
}

/// Declaration-time property keys, stripped before the remainder becomes
/// the relation's fetch options.
const KEY_MODEL: &str = "model";
const KEY_MAPPING: &str = "mapping";
const KEY_REVERSE: &str = "reverse";
const KEY_COUNTER_CACHE: &str = "counter_cache";
const KEY_SOURCE: &str = "source";

impl RelationManager {
    pub fn new(models: ModelRegistry) -> Self {
        Self {
            models,
            relations: Arc::new(DashMap::new()),
        }
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Declares `owner belongs_to target`. The association id defaults to
    /// the target model name.
    pub fn belongs_to(&self, owner: &str, target: &str, properties: &str) -> OrmResult<Arc<Relation>> {
        self.setup_relation(owner, RelationKind::BelongsTo, None, Some(target), properties)
    }

    /// Declares `owner has_one target`. The association id defaults to the
    /// target model name.
    pub fn has_one(&self, owner: &str, target: &str, properties: &str) -> OrmResult<Arc<Relation>> {
        self.setup_relation(owner, RelationKind::HasOne, None, Some(target), properties)
    }

    /// Declares `owner has_many target`. The association id defaults to
    /// the pluralized target model name.
    pub fn has_many(&self, owner: &str, target: &str, properties: &str) -> OrmResult<Arc<Relation>> {
        self.setup_relation(owner, RelationKind::HasMany, None, Some(target), properties)
    }

    /// Declares a relation under an explicit association id. The target
    /// model comes from the `model` property, or is derived from the
    /// association id.
    pub fn setup(
        &self,
        owner: &str,
        kind: RelationKind,
        association_id: &str,
        properties: &str,
    ) -> OrmResult<Arc<Relation>> {
        self.setup_relation(owner, kind, Some(association_id), None, properties)
    }

    fn setup_relation(
        &self,
        owner: &str,
        kind: RelationKind,
        association_id: Option<&str>,
        target: Option<&str>,
        properties: &str,
    ) -> OrmResult<Arc<Relation>> {
        if kind == RelationKind::HasManyThrough {
            return Err(OrmError::Configuration(
                "has-many-through relations must be declared via has_many_through()".to_string(),
            ));
        }

        let mut pairs: HashMap<String, String> = parse_option_pairs(properties).into_iter().collect();

        let target_model = match (target, pairs.get(KEY_MODEL)) {
            (Some(target), _) => target.to_string(),
            (None, Some(model)) => model.clone(),
            (None, None) => match association_id {
                Some(id) if kind == RelationKind::HasMany => inflect::singularize(id),
                Some(id) => id.to_string(),
                None => {
                    return Err(OrmError::Configuration(
                        "relation declaration names neither a target model nor an association id"
                            .to_string(),
                    ))
                }
            },
        };

        let association_id = match association_id {
            Some(id) => id.to_string(),
            None => {
                if kind == RelationKind::HasMany {
                    inflect::pluralize(&target_model)
                } else {
                    target_model.clone()
                }
            }
        };

        let key = relation_key(owner, &association_id);
        if let Some(existing) = self.relations.get(&key) {
            return Ok(Arc::clone(&existing));
        }

        let mapping = match pairs.remove(KEY_MAPPING) {
            Some(mapping) => JoinMapping::parse(&mapping)?,
            None => default_mapping(kind, owner, &target_model)?,
        };
        self.validate_mapping(owner, &target_model, &mapping)?;

        let reverse = pairs.remove(KEY_REVERSE);
        let counter_cache =
            self.interpret_counter_cache(kind, owner, &target_model, pairs.remove(KEY_COUNTER_CACHE))?;
        pairs.remove(KEY_MODEL);

        let options = QueryOptions::from_pairs(pairs)?;

        let relation = Arc::new(
            Relation::new(owner, kind, &association_id, &target_model, mapping)
                .with_properties(options)
                .with_reverse(reverse)
                .with_counter_cache(counter_cache),
        );

        tracing::debug!(
            owner,
            kind = kind.as_str(),
            association = %association_id,
            target = %target_model,
            "registered relation"
        );
        self.relations.insert(key, Arc::clone(&relation));
        Ok(relation)
    }

    /// Declares `owner has_many targets through through_association`.
    ///
    /// Both legs must already be registered: the owner's through
    /// association reaching the middle model, and the middle model's
    /// association reaching the targets (overridable with the `source`
    /// property). The composed relation filters the target query on
    /// middle-table columns populated from the owner's key.
    pub fn has_many_through(
        &self,
        owner: &str,
        targets: &str,
        through_association: &str,
        properties: &str,
        join_inputs: HashMap<String, Value>,
    ) -> OrmResult<Arc<Relation>> {
        let key = relation_key(owner, targets);
        if let Some(existing) = self.relations.get(&key) {
            return Ok(Arc::clone(&existing));
        }

        let ac = self.relation(owner, through_association)?;
        let middle_model = ac.target_model().to_string();

        let mut pairs: HashMap<String, String> = parse_option_pairs(properties).into_iter().collect();

        let cb = match pairs.remove(KEY_SOURCE) {
            Some(source) => self.relation(&middle_model, &source)?,
            None => self
                .get(&middle_model, targets)
                .or_else(|| self.get(&middle_model, &inflect::singularize(targets)))
                .ok_or_else(|| OrmError::UndefinedRelation {
                    owner: middle_model.clone(),
                    association: targets.to_string(),
                })?,
        };

        let reverse = pairs.remove(KEY_REVERSE);
        let options = QueryOptions::from_pairs(pairs)?;

        // The combined owner->target filter lands on the middle table's
        // foreign-key columns, qualified so the delegated layer can join.
        let middle_table = inflect::pluralize(&middle_model);
        let mapping = ac.mapping().qualified(&middle_table);

        let target_model = cb.target_model().to_string();
        let relation = Arc::new(
            Relation::new(owner, RelationKind::HasManyThrough, targets, &target_model, mapping)
                .with_properties(options)
                .with_reverse(reverse)
                .with_through(ThroughRelation {
                    through_association: through_association.to_string(),
                    middle_model,
                    ac,
                    cb,
                    join_inputs,
                }),
        );

        self.relations.insert(key, Arc::clone(&relation));
        Ok(relation)
    }

    /// Looks up a declared relation, failing for unknown association ids.
    pub fn relation(&self, owner: &str, association: &str) -> OrmResult<Arc<Relation>> {
        self.get(owner, association)
            .ok_or_else(|| OrmError::UndefinedRelation {
                owner: owner.to_string(),
                association: association.to_string(),
            })
    }

    fn get(&self, owner: &str, association: &str) -> Option<Arc<Relation>> {
        self.relations
            .get(&relation_key(owner, association))
            .map(|r| Arc::clone(&r))
    }

    /// All relations declared on a model.
    pub fn relations_of(&self, owner: &str) -> Vec<Arc<Relation>> {
        self.relations
            .iter()
            .filter(|entry| entry.value().owner_model() == owner)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Creates the per-owner-record runtime for an association.
    pub fn record_relation(&self, owner: &str, association: &str) -> OrmResult<RecordRelation> {
        let relation = self.relation(owner, association)?;
        Ok(RecordRelation::new(relation, self.models.clone()))
    }

    /// Finds the reverse of a relation: the explicit `reverse` property
    /// first, then association-id matches, then a shape-based search.
    pub fn reverse_relation(&self, relation: &Relation) -> OrmResult<Arc<Relation>> {
        if let Some(reverse) = relation.reverse() {
            return self.relation(relation.target_model(), reverse);
        }

        let owner = relation.owner_model();
        let target = relation.target_model();

        let found = match relation.kind() {
            RelationKind::HasOne | RelationKind::HasMany => self
                .get(target, owner)
                .filter(|r| r.kind() == RelationKind::BelongsTo)
                .or_else(|| self.find_by_shape(target, owner, RelationKind::BelongsTo)),
            RelationKind::BelongsTo => self
                .get(target, &inflect::pluralize(owner))
                .or_else(|| self.get(target, owner))
                .or_else(|| self.find_by_shape(target, owner, RelationKind::HasMany))
                .or_else(|| self.find_by_shape(target, owner, RelationKind::HasOne)),
            // Through relations must name their reverse explicitly.
            RelationKind::HasManyThrough => None,
        };

        found.ok_or_else(|| OrmError::UndefinedReverseRelation {
            owner: owner.to_string(),
            target: target.to_string(),
        })
    }

    fn find_by_shape(&self, owner: &str, target: &str, kind: RelationKind) -> Option<Arc<Relation>> {
        self.relations
            .iter()
            .find(|entry| {
                let r = entry.value();
                r.owner_model() == owner && r.target_model() == target && r.kind() == kind
            })
            .map(|entry| Arc::clone(entry.value()))
    }

    fn validate_mapping(&self, owner: &str, target: &str, mapping: &JoinMapping) -> OrmResult<()> {
        for column in mapping.owner_columns() {
            if !self.models.has_column(owner, column)? {
                return Err(OrmError::Configuration(format!(
                    "join mapping references unknown column '{}' on model '{}'",
                    column, owner
                )));
            }
        }
        for column in mapping.target_columns() {
            if !self.models.has_column(target, column)? {
                return Err(OrmError::Configuration(format!(
                    "join mapping references unknown column '{}' on model '{}'",
                    column, target
                )));
            }
        }
        Ok(())
    }

    fn interpret_counter_cache(
        &self,
        kind: RelationKind,
        owner: &str,
        target: &str,
        value: Option<String>,
    ) -> OrmResult<Option<CounterCache>> {
        let Some(value) = value else { return Ok(None) };

        if kind != RelationKind::BelongsTo {
            return Err(OrmError::Configuration(format!(
                "counter_cache is only valid on belongs-to relations, not {}",
                kind.as_str()
            )));
        }

        if value.eq_ignore_ascii_case("false") {
            return Ok(None);
        }

        let column = if value.eq_ignore_ascii_case("true") {
            CounterCache::default_column(owner)
        } else {
            // An explicit column name must exist on the parent model.
            if !self.models.has_column(target, &value)? {
                return Err(OrmError::Configuration(format!(
                    "counter-cache column '{}' does not exist on model '{}'",
                    value, target
                )));
            }
            value
        };

        Ok(Some(CounterCache { column }))
    }
}

fn relation_key(owner: &str, association: &str) -> String {
    format!("{}/{}", owner, association)
}

fn default_mapping(kind: RelationKind, owner: &str, target: &str) -> OrmResult<JoinMapping> {
    let mapping = match kind {
        RelationKind::BelongsTo => format!("{}_id=id", target),
        RelationKind::HasOne | RelationKind::HasMany => format!("id={}_id", owner),
        RelationKind::HasManyThrough => {
            return Err(OrmError::Configuration(
                "has-many-through relations derive their mapping from their legs".to_string(),
            ))
        }
    };
    JoinMapping::parse(&mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{registry_with_models, shop_models};

    fn manager() -> RelationManager {
        RelationManager::new(shop_models())
    }

    #[test]
    fn belongs_to_defaults_mapping_and_association_id() {
        let manager = manager();
        let relation = manager.belongs_to("invoice", "order", "").unwrap();

        assert_eq!(relation.association_id(), "order");
        assert_eq!(relation.kind(), RelationKind::BelongsTo);
        assert_eq!(
            relation.mapping().pairs(),
            &[("order_id".to_string(), "id".to_string())]
        );
    }

    #[test]
    fn has_many_pluralizes_association_id() {
        let manager = manager();
        let relation = manager.has_many("order", "line_item", "").unwrap();

        assert_eq!(relation.association_id(), "line_items");
        assert_eq!(
            relation.mapping().pairs(),
            &[("id".to_string(), "order_id".to_string())]
        );
    }

    #[test]
    fn explicit_mapping_overrides_default() {
        let manager = manager();
        let relation = manager
            .belongs_to("invoice", "order", "mapping: order_id=id")
            .unwrap();
        assert_eq!(
            relation.mapping().pairs(),
            &[("order_id".to_string(), "id".to_string())]
        );
    }

    #[test]
    fn mapping_with_unknown_column_fails_registration() {
        let manager = manager();
        let err = manager
            .belongs_to("invoice", "order", "mapping: ghost_id=id")
            .unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));
        assert!(err.to_string().contains("ghost_id"));
    }

    #[test]
    fn relation_properties_keep_fetch_options() {
        let manager = manager();
        let relation = manager
            .has_many("order", "line_item", "order_by: position; conditions_sql: voided = 0")
            .unwrap();
        assert_eq!(relation.properties().order_by.as_deref(), Some("position"));
        assert_eq!(
            relation.properties().conditions_sql.as_deref(),
            Some("voided = 0")
        );
    }

    #[test]
    fn counter_cache_true_derives_default_column() {
        let manager = manager();
        let relation = manager
            .belongs_to("invoice", "order", "counter_cache: true")
            .unwrap();
        assert_eq!(relation.counter_cache().unwrap().column, "invoices_count");
    }

    #[test]
    fn counter_cache_explicit_column_is_validated() {
        let manager = manager();
        let relation = manager
            .belongs_to("line_item", "order", "counter_cache: items_total")
            .unwrap();
        assert_eq!(relation.counter_cache().unwrap().column, "items_total");

        let err = manager
            .belongs_to("payment", "order", "counter_cache: missing_count")
            .unwrap_err();
        assert!(err.to_string().contains("missing_count"));
    }

    #[test]
    fn counter_cache_false_disables() {
        let manager = manager();
        let relation = manager
            .belongs_to("invoice", "order", "counter_cache: false")
            .unwrap();
        assert!(!relation.has_counter_cache());
    }

    #[test]
    fn duplicate_registration_returns_existing() {
        let manager = manager();
        let first = manager.belongs_to("invoice", "order", "").unwrap();
        let second = manager
            .belongs_to("invoice", "order", "counter_cache: true")
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.has_counter_cache());
    }

    #[test]
    fn undefined_relation_lookup_fails() {
        let manager = manager();
        let err = manager.relation("invoice", "warehouse").unwrap_err();
        assert_eq!(
            err,
            OrmError::UndefinedRelation {
                owner: "invoice".to_string(),
                association: "warehouse".to_string(),
            }
        );
    }

    #[test]
    fn through_requires_both_legs() {
        let manager = manager();
        let err = manager
            .has_many_through("project", "employees", "assignments", "", HashMap::new())
            .unwrap_err();
        assert_eq!(
            err,
            OrmError::UndefinedRelation {
                owner: "project".to_string(),
                association: "assignments".to_string(),
            }
        );

        manager.has_many("project", "assignment", "").unwrap();
        let err = manager
            .has_many_through("project", "employees", "assignments", "", HashMap::new())
            .unwrap_err();
        assert_eq!(
            err,
            OrmError::UndefinedRelation {
                owner: "assignment".to_string(),
                association: "employees".to_string(),
            }
        );
    }

    #[test]
    fn through_composes_mapping_onto_middle_table() {
        let manager = manager();
        manager.has_many("project", "assignment", "").unwrap();
        manager
            .belongs_to("assignment", "employee", "")
            .unwrap();
        // The middle->target leg viewed from the middle model.
        let relation = manager
            .has_many_through("project", "employees", "assignments", "source: employee", HashMap::new())
            .unwrap();

        assert_eq!(relation.target_model(), "employee");
        assert_eq!(relation.through().unwrap().middle_model, "assignment");
        assert_eq!(
            relation.mapping().pairs(),
            &[("id".to_string(), "assignments.project_id".to_string())]
        );
    }

    #[test]
    fn reverse_relation_by_name_and_shape() {
        let manager = manager();
        manager.has_many("order", "invoice", "").unwrap();
        let belongs = manager.belongs_to("invoice", "order", "").unwrap();

        // belongs-to reverse: pluralized owner name on the target.
        let reverse = manager.reverse_relation(&belongs).unwrap();
        assert_eq!(reverse.association_id(), "invoices");
        assert_eq!(reverse.kind(), RelationKind::HasMany);

        // has-many reverse: belongs-to found by association id.
        let has_many = manager.relation("order", "invoices").unwrap();
        let reverse = manager.reverse_relation(&has_many).unwrap();
        assert_eq!(reverse.kind(), RelationKind::BelongsTo);
        assert_eq!(reverse.association_id(), "order");
    }

    #[test]
    fn missing_reverse_relation_is_an_error() {
        let manager = manager();
        let relation = manager.belongs_to("invoice", "order", "").unwrap();
        let err = manager.reverse_relation(&relation).unwrap_err();
        assert_eq!(
            err,
            OrmError::UndefinedReverseRelation {
                owner: "invoice".to_string(),
                target: "order".to_string(),
            }
        );
    }

    #[test]
    fn unregistered_owner_model_fails_registration() {
        let manager = RelationManager::new(registry_with_models(&[("order", &["id"])]));
        let err = manager.belongs_to("invoice", "order", "").unwrap_err();
        assert_eq!(err, OrmError::UnregisteredModel("invoice".to_string()));
    }
}
