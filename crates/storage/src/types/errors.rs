//! Error types for the storage layer

use thiserror::Error;

/// Failures of the underlying key/value backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage connection error: {0}")]
    ConnectionError(String),

    #[error("Storage query error: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Storage migration error: {0}")]
    MigrationError(String),

    #[error("Unsupported storage url: {0}")]
    UnsupportedUrl(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Persistence store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Forum post not found: {0}")]
    PostNotFound(String),

    #[error("Stale revision: expected {expected}, found {actual}")]
    RevisionConflict { expected: u64, actual: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for DatabaseError {
    fn from(error: serde_json::Error) -> Self {
        DatabaseError::Storage(StorageError::SerializationError(error))
    }
}
