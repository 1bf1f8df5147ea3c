//! Relation metadata
//!
//! Immutable descriptions of declared associations: cardinality kind, join
//! mapping, fetch-option properties, the counter-cache configuration of
//! belongs-to relations, and the two-leg composition of has-many-through
//! relations. Construction and validation happen at registration time in
//! [`crate::relations::RelationManager`]; nothing here fails at fetch time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::inflect;
use crate::query::options::QueryOptions;

/// Cardinality and direction of a declared relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Owner holds the foreign key to the target
    BelongsTo,
    /// Target holds the foreign key; at most one target record
    HasOne,
    /// Target holds the foreign key; many target records
    HasMany,
    /// Plural relation resolved through a middle model
    HasManyThrough,
}

impl RelationKind {
    /// True for relations that resolve to an ordered collection.
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::HasManyThrough)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::HasOne => "has_one",
            Self::HasMany => "has_many",
            Self::HasManyThrough => "has_many_through",
        }
    }

    pub fn parse(kind: &str) -> OrmResult<Self> {
        match kind {
            "belongs_to" => Ok(Self::BelongsTo),
            "has_one" => Ok(Self::HasOne),
            "has_many" => Ok(Self::HasMany),
            "has_many_through" => Ok(Self::HasManyThrough),
            other => Err(OrmError::UnsupportedRelationType(other.to_string())),
        }
    }
}

/// Ordered owner-column -> target-column pairs, parsed from `"a=b,c=d"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMapping {
    pairs: Vec<(String, String)>,
}

impl JoinMapping {
    pub fn parse(mapping: &str) -> OrmResult<Self> {
        let mut pairs = Vec::new();
        for segment in mapping.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (left, right) = segment.split_once('=').ok_or_else(|| {
                OrmError::Configuration(format!(
                    "malformed join mapping segment '{}', expected 'owner_column=target_column'",
                    segment
                ))
            })?;
            let (left, right) = (left.trim(), right.trim());
            if left.is_empty() || right.is_empty() {
                return Err(OrmError::Configuration(format!(
                    "malformed join mapping segment '{}', empty column name",
                    segment
                )));
            }
            pairs.push((left.to_string(), right.to_string()));
        }
        if pairs.is_empty() {
            return Err(OrmError::Configuration(format!(
                "join mapping '{}' contains no column pairs",
                mapping
            )));
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn owner_columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(left, _)| left.as_str())
    }

    pub fn target_columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, right)| right.as_str())
    }

    /// Swaps the two sides, turning an owner->target mapping into the
    /// target->owner mapping of the reverse relation.
    pub fn reversed(&self) -> Self {
        Self {
            pairs: self
                .pairs
                .iter()
                .map(|(left, right)| (right.clone(), left.clone()))
                .collect(),
        }
    }

    /// Qualifies the target side of each pair with a table prefix, used
    /// when a through-relation filters the target query on middle-table
    /// columns.
    pub fn qualified(&self, table: &str) -> Self {
        Self {
            pairs: self
                .pairs
                .iter()
                .map(|(left, right)| {
                    let right = if right.contains('.') {
                        right.clone()
                    } else {
                        format!("{}.{}", table, right)
                    };
                    (left.clone(), right)
                })
                .collect(),
        }
    }
}

/// Counter-cache configuration of a belongs-to relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterCache {
    /// Counter column on the target (parent) model
    pub column: String,
}

impl CounterCache {
    /// Default counter column: pluralized owner model plus `_count`.
    pub fn default_column(owner_model: &str) -> String {
        format!("{}_count", inflect::pluralize(owner_model))
    }
}

/// The two registered legs a has-many-through relation is composed of.
#[derive(Clone)]
pub struct ThroughRelation {
    /// Association name on the owner that reaches the middle model
    pub through_association: String,
    /// The middle model's name
    pub middle_model: String,
    /// Owner -> middle leg
    pub ac: Arc<Relation>,
    /// Middle -> target leg
    pub cb: Arc<Relation>,
    /// Extra column values for join-table inserts
    pub join_inputs: HashMap<String, Value>,
}

impl std::fmt::Debug for ThroughRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThroughRelation")
            .field("through_association", &self.through_association)
            .field("middle_model", &self.middle_model)
            .field("ac", &self.ac.association_id())
            .field("cb", &self.cb.association_id())
            .finish()
    }
}

/// Immutable description of one declared association.
#[derive(Debug, Clone)]
pub struct Relation {
    owner_model: String,
    kind: RelationKind,
    association_id: String,
    target_model: String,
    mapping: JoinMapping,
    properties: QueryOptions,
    reverse: Option<String>,
    counter_cache: Option<CounterCache>,
    through: Option<ThroughRelation>,
}

impl Relation {
    pub(crate) fn new(
        owner_model: &str,
        kind: RelationKind,
        association_id: &str,
        target_model: &str,
        mapping: JoinMapping,
    ) -> Self {
        Self {
            owner_model: owner_model.to_string(),
            kind,
            association_id: association_id.to_string(),
            target_model: target_model.to_string(),
            mapping,
            properties: QueryOptions::default(),
            reverse: None,
            counter_cache: None,
            through: None,
        }
    }

    pub(crate) fn with_properties(mut self, properties: QueryOptions) -> Self {
        self.properties = properties;
        self
    }

    pub(crate) fn with_reverse(mut self, reverse: Option<String>) -> Self {
        self.reverse = reverse;
        self
    }

    pub(crate) fn with_counter_cache(mut self, counter_cache: Option<CounterCache>) -> Self {
        self.counter_cache = counter_cache;
        self
    }

    pub(crate) fn with_through(mut self, through: ThroughRelation) -> Self {
        debug_assert_eq!(self.target_model, through.cb.target_model());
        self.through = Some(through);
        self
    }

    pub fn owner_model(&self) -> &str {
        &self.owner_model
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Logical name of the association on the owner.
    pub fn association_id(&self) -> &str {
        &self.association_id
    }

    pub fn target_model(&self) -> &str {
        &self.target_model
    }

    /// Owner->target join mapping. For has-many-through this is the
    /// composed mapping onto middle-table columns; see
    /// [`Relation::through`].
    pub fn mapping(&self) -> &JoinMapping {
        &self.mapping
    }

    /// Fetch-option overrides merged into every fetch for this relation.
    pub fn properties(&self) -> &QueryOptions {
        &self.properties
    }

    /// Explicitly declared reverse association name, if any.
    pub fn reverse(&self) -> Option<&str> {
        self.reverse.as_deref()
    }

    pub fn counter_cache(&self) -> Option<&CounterCache> {
        self.counter_cache.as_ref()
    }

    pub fn has_counter_cache(&self) -> bool {
        self.counter_cache.is_some()
    }

    pub fn through(&self) -> Option<&ThroughRelation> {
        self.through.as_ref()
    }
}
