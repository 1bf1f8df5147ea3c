//! Category declarations for polymorphic groupings
//!
//! A category names a family of models reachable through one shared id
//! column and one type column; the type column's value selects the
//! concrete entity model. Declarations are registered up front and checked
//! at first use, so a typo in a category or entity name surfaces as an
//! error rather than an empty result.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{OrmError, OrmResult};

/// One declared category: its discriminator columns and the type-value to
/// entity-model mapping.
#[derive(Debug, Clone)]
pub struct Category {
    name: String,
    id_field: String,
    type_field: String,
    entities: HashMap<String, String>,
}

impl Category {
    pub fn new(name: &str, id_field: &str, type_field: &str) -> Self {
        Self {
            name: name.to_string(),
            id_field: id_field.to_string(),
            type_field: type_field.to_string(),
            entities: HashMap::new(),
        }
    }

    /// Adds an entity model under its type-column value.
    pub fn with_entity(mut self, type_value: &str, model: &str) -> Self {
        self.entities.insert(type_value.to_string(), model.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared id column across all entities of the category.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Type column whose value selects the entity model.
    pub fn type_field(&self) -> &str {
        &self.type_field
    }

    /// Resolves a type-column value to its entity model.
    pub fn entity_model(&self, type_value: &str) -> OrmResult<&str> {
        self.entities
            .get(type_value)
            .map(String::as_str)
            .ok_or_else(|| OrmError::UnsupportedEntityInCategory {
                category: self.name.clone(),
                entity: type_value.to_string(),
            })
    }

    /// Type-column value a given entity model is registered under.
    pub fn type_value_of(&self, model: &str) -> OrmResult<&str> {
        self.entities
            .iter()
            .find(|(_, m)| m.as_str() == model)
            .map(|(value, _)| value.as_str())
            .ok_or_else(|| OrmError::UnsupportedEntityInCategory {
                category: self.name.clone(),
                entity: model.to_string(),
            })
    }

    pub fn entity_models(&self) -> impl Iterator<Item = &str> {
        self.entities.values().map(String::as_str)
    }
}

/// Name -> category registry, populated at startup.
#[derive(Clone, Default)]
pub struct CategoryRegistry {
    categories: Arc<DashMap<String, Category>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, category: Category) {
        tracing::debug!(category = category.name(), "registering category");
        self.categories.insert(category.name().to_string(), category);
    }

    pub fn category(&self, name: &str) -> OrmResult<Category> {
        self.categories
            .get(name)
            .map(|c| c.clone())
            .ok_or_else(|| OrmError::UnregisteredCategory(name.to_string()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }
}
