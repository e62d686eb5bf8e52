//! Shared types and result types for the storage layer

pub mod errors;

pub use errors::{DatabaseError, StorageError};

pub type StorageResult<T> = Result<T, StorageError>;
pub type DatabaseResult<T> = Result<T, DatabaseError>;
