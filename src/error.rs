//! Error types for the association engine
//!
//! Three families of failures exist: configuration errors detected at
//! registration time (fatal, never retried), usage errors detected at call
//! time, and database errors surfaced from the delegated finder. Missing
//! foreign keys and confirmed-absent records are not errors and are
//! represented as empty results instead.

/// Result type alias for engine operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error type for engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrmError {
    /// No relation with the given association id is registered on the model
    #[error("undefined relation '{association}' on model '{owner}'")]
    UndefinedRelation { owner: String, association: String },

    /// No reverse relation could be located between the two models
    #[error("undefined reverse relation between '{owner}' and '{target}'")]
    UndefinedReverseRelation { owner: String, target: String },

    /// The relation kind string is not one of the supported kinds
    #[error("unsupported relation type '{0}'")]
    UnsupportedRelationType(String),

    /// A singular accessor was used on a plural relation or vice versa
    #[error("wrong record type: {0}")]
    WrongRecordType(String),

    /// A builder clause was invoked more than once
    #[error("{0}() can only be called once")]
    DuplicateClause(&'static str),

    /// Two builder clauses cannot be combined
    #[error("incompatible clauses: {0}")]
    IncompatibleClauses(String),

    /// The model is not present in the model registry
    #[error("unregistered model '{0}'")]
    UnregisteredModel(String),

    /// The category is not present in the category registry
    #[error("unregistered category '{0}'")]
    UnregisteredCategory(String),

    /// The entity does not belong to the category
    #[error("entity '{entity}' is not supported in category '{category}'")]
    UnsupportedEntityInCategory { category: String, entity: String },

    /// Invalid registration-time input (malformed mapping, missing
    /// counter-cache column, unknown option key, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Error reported by the delegated query execution layer
    #[error("database error: {0}")]
    Database(String),
}
