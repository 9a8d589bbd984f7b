// 🚨 Errors - storage failures and payload validation

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Generic payload rejection. Carries one message, never per-field detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid payload: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }
}

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No database configured; the storage is a disconnected placeholder
    #[error("database unavailable: no connection configured")]
    Unavailable,

    /// Lookup matched nothing
    #[error("not found: {0}")]
    NotFound(String),

    /// Payload failed validation
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// SQLite error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// True when the failure is a uniqueness/foreign-key violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
