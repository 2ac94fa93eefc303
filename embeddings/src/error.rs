//! Error types for the embeddings system.

use thiserror::Error;

use crate::context::ContextError;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The local limiter gave up waiting because the context fired.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(#[source] ContextError),

    /// The remote provider throttled the request.
    #[error("provider rate limited the request, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Provider answered without any embedding.
    #[error("no embedding returned")]
    NoEmbeddingReturned,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Vectors of different lengths were compared.
    #[error("vector length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// Similarity is undefined for a zero-norm vector.
    #[error("zero vector encountered")]
    ZeroVector,

    /// The calling context was cancelled.
    #[error("embedding request cancelled")]
    Cancelled,

    /// The calling context's deadline passed.
    #[error("embedding request timed out")]
    TimedOut,

    /// Cache backend error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EmbeddingError {
    /// Whether this failure was caused by cancellation or a deadline rather
    /// than by the provider or a backend.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::TimedOut | Self::RateLimitExceeded(_)
        )
    }
}

impl From<ContextError> for EmbeddingError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::TimedOut,
        }
    }
}

impl From<redis::RedisError> for EmbeddingError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}
