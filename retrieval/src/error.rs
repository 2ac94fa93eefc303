//! Error types for record storage and search.

use semsearch_embeddings::{ContextError, EmbeddingError};
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by [`crate::BookService`].
///
/// Each category maps to a distinct caller-visible outcome; cancellation and
/// deadlines never masquerade as backend failures.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Caller supplied an unusable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record with this external identifier already exists.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Producing an embedding failed.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(#[source] EmbeddingError),

    /// A storage call failed.
    #[error("storage failed: {0}")]
    StorageFailed(#[source] StorageError),

    /// The calling context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The calling context's deadline passed.
    #[error("operation timed out")]
    TimedOut,
}

impl ServiceError {
    /// Whether the failure was caused by cancellation or a deadline anywhere
    /// in the chain.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled | Self::TimedOut => true,
            Self::EmbeddingFailed(err) => err.is_cancellation(),
            Self::StorageFailed(err) => err.is_cancellation(),
            Self::InvalidInput(_) | Self::AlreadyExists(_) => false,
        }
    }
}

impl From<ContextError> for ServiceError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::TimedOut,
        }
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Unique external identifier already taken.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The calling context was cancelled.
    #[error("storage call cancelled")]
    Cancelled,

    /// The calling context's deadline passed.
    #[error("storage call timed out")]
    TimedOut,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}

impl From<ContextError> for StorageError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::TimedOut,
        }
    }
}
