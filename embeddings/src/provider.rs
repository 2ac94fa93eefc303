//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the single capability "produce a vector for this
//! text". The remote Gemini client implements it directly; decorators such as
//! [`crate::cache::CachedProvider`] implement it by wrapping another provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::Embedding;
use crate::context::RequestContext;
use crate::error::{EmbeddingError, Result};
use crate::rate_limit::EmbeddingRateLimiter;

/// Default Gemini API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Gemini embedding model.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-embedding-001";

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Dimension of the vectors this provider returns.
    fn dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, ctx: &RequestContext, text: &str) -> Result<Embedding>;
}

#[async_trait]
impl<P> EmbeddingProvider for Arc<P>
where
    P: EmbeddingProvider + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    async fn embed(&self, ctx: &RequestContext, text: &str) -> Result<Embedding> {
        (**self).embed(ctx, text).await
    }
}

/// Gemini embedding provider.
///
/// Every call first waits on the shared [`EmbeddingRateLimiter`], then sends
/// a single-item `batchEmbedContents` request asking for exactly
/// `dimension` output values. Failures are returned as-is; nothing is retried.
pub struct GeminiProvider {
    /// API key.
    api_key: String,

    /// API base URL.
    base_url: String,

    /// Model name without the `models/` prefix.
    model: String,

    /// Requested output dimensionality.
    dimension: usize,

    /// HTTP client.
    client: reqwest::Client,

    /// Shared outbound limiter.
    limiter: Arc<EmbeddingRateLimiter>,
}

impl GeminiProvider {
    /// Create a new Gemini provider. Fails if `api_key` is empty.
    pub fn new(
        api_key: impl Into<String>,
        dimension: usize,
        limiter: Arc<EmbeddingRateLimiter>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::ProviderNotConfigured);
        }

        Ok(Self {
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: GEMINI_DEFAULT_MODEL.to_string(),
            dimension,
            client: reqwest::Client::new(),
            limiter,
        })
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = model
            .strip_prefix("models/")
            .map(str::to_string)
            .unwrap_or(model);
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url, self.model
        )
    }

    fn request_body(&self, text: &str) -> GeminiBatchRequest {
        GeminiBatchRequest {
            requests: vec![GeminiEmbedRequest {
                model: format!("models/{}", self.model),
                content: GeminiContent {
                    role: "user".to_string(),
                    parts: vec![GeminiPart {
                        text: text.to_string(),
                    }],
                },
                output_dimensionality: self.dimension,
            }],
        }
    }

    async fn send(&self, text: &str) -> Result<Embedding> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "status {status}: {error_text}"
            )));
        }

        let result: GeminiBatchResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        result
            .embeddings
            .into_iter()
            .next()
            .map(|e| e.values)
            .ok_or(EmbeddingError::NoEmbeddingReturned)
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, ctx: &RequestContext, text: &str) -> Result<Embedding> {
        self.limiter.acquire(ctx).await?;

        let result = match ctx.run(self.send(text)).await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(embedding) => {
                debug!(length = embedding.len(), "embedding success");
                Ok(embedding)
            }
            Err(err) => {
                error!(error = %err, model = %self.model, "embedding failed");
                Err(err)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::ContextError;
    use crate::rate_limit::RateLimitConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/v1beta/models/gemini-embedding-001:batchEmbedContents";

    fn limiter() -> Arc<EmbeddingRateLimiter> {
        Arc::new(
            EmbeddingRateLimiter::new(RateLimitConfig {
                requests_per_second: 100,
                burst: 10,
            })
            .unwrap(),
        )
    }

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key", 3, limiter())
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let err = GeminiProvider::new("  ", 768, limiter()).unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let provider = GeminiProvider::new("k", 768, limiter())
            .unwrap()
            .with_model("models/text-embedding-004");
        assert_eq!(provider.model(), "text-embedding-004");
    }

    #[tokio::test]
    async fn test_embed_uses_first_embedding_and_requests_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "requests": [{
                    "model": "models/gemini-embedding-001",
                    "content": { "parts": [{ "text": "A desert planet" }] },
                    "outputDimensionality": 3
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [
                    { "values": [0.1, 0.2, 0.3] },
                    { "values": [9.0, 9.0, 9.0] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedding = provider(&server)
            .embed(&RequestContext::background(), "A desert planet")
            .await
            .unwrap();

        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_empty_text_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [{ "values": [1.0, 0.0, 0.0] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedding = provider(&server)
            .embed(&RequestContext::background(), "")
            .await
            .unwrap();
        assert_eq!(embedding.len(), 3);
    }

    #[tokio::test]
    async fn test_no_embedding_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [] })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .embed(&RequestContext::background(), "text")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::NoEmbeddingReturned));
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .embed(&RequestContext::background(), "text")
            .await
            .unwrap_err();
        match err {
            EmbeddingError::ApiRequest(message) => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_provider_throttling_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .embed(&RequestContext::background(), "text")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_never_reaches_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = RequestContext::background();
        ctx.cancel();

        let err = provider(&server).embed(&ctx, "text").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RateLimitExceeded(ContextError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_slow_provider_honours_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embeddings": [{ "values": [1.0, 0.0, 0.0] }] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let ctx = RequestContext::with_timeout(Duration::from_millis(100));
        let err = provider(&server).embed(&ctx, "text").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::TimedOut));
    }
}
