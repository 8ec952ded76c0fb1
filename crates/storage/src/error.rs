use migrator_core::Error as CoreError;
use thiserror::Error;

/// Storage-specific error types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violated: {0}")]
    ConstraintViolated(String),

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database error: {0}")]
    BackendError(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("row not found".to_string()),
            other => StorageError::BackendError(other.to_string()),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => CoreError::not_found(msg),
            other => CoreError::storage(other.to_string()),
        }
    }
}
