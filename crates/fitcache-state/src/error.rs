//! Error types for fitcache-state

use thiserror::Error;

/// Errors raised while connecting to or initialising the database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors surfaced through the [`crate::RecordStore`] trait.
#[derive(Error, Debug)]
pub enum RecordError {
    /// No model row exists for the given model id.
    #[error("model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// A prediction row for the same (model, as-of date, entity) already exists.
    #[error("duplicate prediction for model {model_hash} entity {entity_id} as of {as_of_date}")]
    DuplicatePrediction {
        model_hash: String,
        entity_id: i64,
        as_of_date: String,
    },

    /// A string could not be parsed as a fingerprint.
    #[error("invalid fingerprint: {value}")]
    InvalidFingerprint { value: String },

    /// Backend failure (query, transaction, decoding).
    #[error("record backend error: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for RecordError {
    fn from(err: surrealdb::Error) -> Self {
        RecordError::Backend(err.to_string())
    }
}
