//! Configuration for the search service.

use std::time::Duration;

use semsearch_embeddings::provider::{GEMINI_BASE_URL, GEMINI_DEFAULT_MODEL};
use semsearch_embeddings::{DEFAULT_CACHE_TTL, DEFAULT_DIMENSION, RateLimitConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fixed embedding dimensionality for the collection.
    pub dimension: usize,

    /// Upper bound for a single candidate retrieval call, in seconds.
    pub storage_timeout_secs: u64,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Query processing configuration.
    pub query: QueryConfig,
}

impl ServiceConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            storage_timeout_secs: 5,
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
        }
    }

    /// Set the embedding dimensionality.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the query configuration.
    pub fn with_query(mut self, config: QueryConfig) -> Self {
        self.query = config;
        self
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings.
    pub model: String,

    /// API base URL.
    pub base_url: String,

    /// Sustained outbound requests per second.
    pub requests_per_second: u32,

    /// Outbound burst allowance.
    pub burst: u32,

    /// Whether to cache embeddings.
    pub cache_enabled: bool,

    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum entries for the in-process cache.
    pub cache_max_entries: usize,
}

impl EmbeddingConfig {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second: self.requests_per_second,
            burst: self.burst,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let rate = RateLimitConfig::default();
        Self {
            model: GEMINI_DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            requests_per_second: rate.requests_per_second,
            burst: rate.burst,
            cache_enabled: true,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            cache_max_entries: 10_000,
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum number of results to return; 0 means no limit.
    pub max_results: usize,

    /// Sort results by descending similarity. When false, results keep the
    /// order storage returned the candidates in.
    pub sort_by_similarity: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_results: 0,
            sort_by_similarity: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.dimension, 768);
        assert_eq!(config.storage_timeout(), Duration::from_secs(5));
        assert_eq!(config.embedding.rate_limit(), RateLimitConfig::default());
        assert_eq!(config.embedding.cache_ttl(), Duration::from_secs(86_400));
        assert!(config.query.sort_by_similarity);
        assert_eq!(config.query.max_results, 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            dimension = 3

            [query]
            max_results = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.dimension, 3);
        assert_eq!(config.query.max_results, 25);
        assert!(config.query.sort_by_similarity);
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }
}
