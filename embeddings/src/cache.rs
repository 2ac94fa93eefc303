//! Embedding cache for avoiding redundant provider calls.
//!
//! [`CachedProvider`] wraps any [`EmbeddingProvider`] and keys results on a
//! normalized form of the input text, so inputs that differ only in case or
//! surrounding whitespace share one entry. Caching is purely an optimization:
//! every backend or serialization failure is logged and the request carries
//! on as if the entry were absent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::Embedding;
use crate::context::RequestContext;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Prefix shared by every embedding cache key.
pub const CACHE_KEY_PREFIX: &str = "embed:";

/// How long a cached embedding stays valid.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Compute the cache key for `text`.
///
/// The text is trimmed and lowercased, hashed with xxHash64 (seed 0), and the
/// hash is rendered as lowercase hex after [`CACHE_KEY_PREFIX`].
pub fn cache_key(text: &str) -> String {
    let normalized = text.trim().to_lowercase();
    format!("{CACHE_KEY_PREFIX}{:x}", xxh64(normalized.as_bytes(), 0))
}

/// Key/value store with per-key expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Fetch a value. `Ok(None)` means the key is absent or expired.
    async fn get(&self, ctx: &RequestContext, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, ctx: &RequestContext, key: &str, value: Vec<u8>, ttl: Duration)
    -> Result<()>;
}

/// Cache entry with its expiry instant.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache backend.
///
/// Expired entries are dropped lazily on read; when full, the entry closest
/// to expiry is evicted. A capacity of zero stores nothing.
pub struct MemoryCacheBackend {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
}

impl MemoryCacheBackend {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
        }
    }

    /// Number of stored entries, expired ones included until next read.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Cleared embedding cache");
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, ctx: &RequestContext, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();

        {
            let entries = ctx.run(self.entries.read()).await?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = ctx.run(self.entries.write()).await?;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<()> {
        if self.max_entries == 0 {
            return Ok(());
        }
        let mut entries = ctx.run(self.entries.write()).await?;

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, v)| v.expires_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

/// Redis cache backend.
///
/// Uses a multiplexed async connection per call; Redis handles expiry
/// through `SETEX`.
#[derive(Clone)]
pub struct RedisCacheBackend {
    client: redis::Client,
}

impl RedisCacheBackend {
    /// Create a backend from a connection URL such as `redis://localhost:6379`.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    /// Open a connection and `PING` the server.
    pub async fn ping(&self, ctx: &RequestContext) -> Result<()> {
        ctx.run(async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, EmbeddingError>(())
        })
        .await?
    }
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, ctx: &RequestContext, key: &str) -> Result<Option<Vec<u8>>> {
        ctx.run(async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok::<_, EmbeddingError>(value)
        })
        .await?
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<()> {
        let seconds = ttl.as_secs().max(1);
        ctx.run(async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let _: () = conn.set_ex(key, value, seconds).await?;
            Ok::<_, EmbeddingError>(())
        })
        .await?
    }
}

/// A wrapper that provides cached embedding generation.
///
/// Concurrent misses for the same key are not coalesced: each caller hits the
/// wrapped provider and the last write wins.
pub struct CachedProvider<P> {
    provider: P,
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider with the default 24h TTL.
    pub fn new(provider: P, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            provider,
            backend,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Set the entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.provider
    }

    async fn lookup(&self, ctx: &RequestContext, key: &str, text: &str) -> Option<Embedding> {
        match self.backend.get(ctx, key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Embedding>(&bytes) {
                Ok(embedding) => {
                    debug!(query = text, "embedding cache hit");
                    Some(embedding)
                }
                Err(err) => {
                    warn!(key, error = %err, "failed to decode cached embedding");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key, backend = self.backend.name(), error = %err, "cache get failed");
                None
            }
        }
    }

    async fn store(&self, ctx: &RequestContext, key: &str, text: &str, embedding: &Embedding) {
        let bytes = match serde_json::to_vec(embedding) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to encode embedding for cache");
                return;
            }
        };

        match self.backend.set(ctx, key, bytes, self.ttl).await {
            Ok(()) => debug!(query = text, "cached embedding"),
            Err(err) => {
                warn!(key, backend = self.backend.name(), error = %err, "cache set failed");
            }
        }
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    async fn embed(&self, ctx: &RequestContext, text: &str) -> Result<Embedding> {
        let key = cache_key(text);

        if let Some(embedding) = self.lookup(ctx, &key, text).await {
            return Ok(embedding);
        }

        let embedding = self.provider.embed(ctx, text).await?;
        self.store(ctx, &key, text, &embedding).await;
        Ok(embedding)
    }
}
