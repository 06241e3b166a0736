//! Typed errors for the schema and query layers.

use thiserror::Error;

/// Errors raised while loading or validating schema documents. Cloneable so
/// the view cache can fan one outcome out to every waiter.
#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("schema not found: model '{model}' (connection {connection:?})")]
    NotFound {
        model: String,
        connection: Option<String>,
    },
    #[error("schema validation: {0}")]
    Validation(String),
    #[error("schema load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown relationship: {0}")]
    UnknownRelationship(String),
    #[error("unsupported relationship type: {0}")]
    UnsupportedRelationshipType(String),
    #[error("relationship '{relation}' missing pivot config: {detail}")]
    MissingPivotConfig { relation: String, detail: String },
    #[error("unknown sort field: {0}")]
    SortField(String),
    #[error("filter value for '{field}' does not match declared type {expected}: {got}")]
    FilterValue {
        field: String,
        expected: &'static str,
        got: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("field '{0}' is readonly")]
    ReadonlyField(String),
    #[error("relationship integrity: {0}")]
    RelationshipIntegrity(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("unknown connection: {0}")]
    UnknownConnection(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl EngineError {
    /// Translate a storage error into the engine taxonomy. Unique-constraint
    /// violations become Conflict, missing rows become NotFound; anything
    /// else stays a Db error (never exposed as a raw driver string upstream).
    pub fn from_db(err: sqlx::Error, subject: &str) -> Self {
        match &err {
            sqlx::Error::RowNotFound => EngineError::NotFound(subject.to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                EngineError::Conflict(format!("{}: {}", subject, db.message()))
            }
            _ => EngineError::Db(err),
        }
    }
}
