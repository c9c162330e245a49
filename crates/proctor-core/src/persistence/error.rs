//! Error types for outcome persistence.

/// Errors produced by an [`super::OutcomeStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("outcome not found for session {0}")]
    NotFound(uuid::Uuid),

    #[error("store rejected write: {0}")]
    Rejected(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
