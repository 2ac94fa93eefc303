//! # Embeddings
//!
//! This crate turns text into fixed-length vectors and compares them.
//!
//! ## Features
//!
//! - **Remote Embeddings**: Gemini embedding API behind a shared rate limiter
//! - **Caching**: Normalized-text cache in front of any provider (memory or Redis)
//! - **Similarity**: Cosine similarity with `f64` accumulation
//! - **Cancellation**: Every suspension point honours a [`RequestContext`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  CachedProvider ──► GeminiProvider ──► EmbeddingRateLimiter     │
//! │       │                    │                                    │
//! │       ▼                    ▼                                    │
//! │  CacheBackend         Embedding ──► cosine_similarity           │
//! │  (Memory/Redis)                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod context;
pub mod error;
pub mod provider;
pub mod rate_limit;
pub mod similarity;

pub use cache::{
    CacheBackend, CachedProvider, DEFAULT_CACHE_TTL, MemoryCacheBackend, RedisCacheBackend,
    cache_key,
};
pub use context::{ContextError, RequestContext};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, GeminiProvider};
pub use rate_limit::{EmbeddingRateLimiter, RateLimitConfig};
pub use similarity::cosine_similarity;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings requested from the provider.
pub const DEFAULT_DIMENSION: usize = 768; // gemini-embedding-001 truncated output
