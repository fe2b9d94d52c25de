//! Repository error types for storage operations.
//!
//! This module provides a [`RepositoryError`] enum shared by every storage
//! engine, so callers can match on outcomes without knowing which backend is
//! active.

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A uniqueness constraint would be violated, e.g. attaching a second
    /// source to a project that already has one.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation of input data failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend connection or communication error.
    #[error("Storage connection error: {0}")]
    Connection(String),

    /// Internal error in the repository layer.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => RepositoryError::Connection(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepositoryError::Serialization(err.to_string())
            }
            other => RepositoryError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => RepositoryError::NotFound(err.to_string()),
            _ => RepositoryError::Connection(err.to_string()),
        }
    }
}
