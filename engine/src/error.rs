//! Error types for the stocksync engine.

use crate::{EntityType, RecordId, SchemaVersion};
use thiserror::Error;

/// All possible errors from the stocksync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("record not found: {entity}/{id}")]
    NotFound { entity: EntityType, id: RecordId },

    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("record already exists: {entity}/{id}")]
    RecordAlreadyExists { entity: EntityType, id: RecordId },

    // Validation errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch {
        expected: SchemaVersion,
        actual: SchemaVersion,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
