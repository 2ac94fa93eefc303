//! Command handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use semsearch_embeddings::{
    CacheBackend, CachedProvider, EmbeddingProvider, EmbeddingRateLimiter, GeminiProvider,
    MemoryCacheBackend, RedisCacheBackend, RequestContext,
};
use semsearch_retrieval::{BookService, MemoryRecordStore, NewBook, Record, ServiceError};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::settings::Settings;

/// Book as printed after `add`; the embedding is left out.
#[derive(Debug, Serialize)]
struct AddedBook<'a> {
    id: String,
    external_id: Option<&'a str>,
    title: &'a str,
    description: &'a str,
    created_at: String,
}

impl<'a> From<&'a Record> for AddedBook<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            id: record.id.to_string(),
            external_id: record.external_id.as_deref(),
            title: &record.title,
            description: &record.description,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Install the stderr log subscriber. An explicit level wins over `RUST_LOG`.
pub fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid log level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}

/// Wire the Gemini client, embedding cache and record store into a service.
pub async fn build_service(settings: &Settings) -> Result<BookService> {
    let Some(api_key) = settings.api_key.as_deref() else {
        bail!("no Gemini API key configured; set GEMINI_API_KEY or pass --api-key");
    };
    let embedding = &settings.service.embedding;

    let limiter = Arc::new(
        EmbeddingRateLimiter::new(embedding.rate_limit()).context("invalid rate limit")?,
    );
    let gemini = GeminiProvider::new(api_key, settings.service.dimension, limiter)
        .context("failed to configure Gemini provider")?
        .with_base_url(embedding.base_url.as_str())
        .with_model(embedding.model.as_str());

    let embedder: Arc<dyn EmbeddingProvider> = if embedding.cache_enabled {
        let backend = cache_backend(settings).await?;
        info!(backend = backend.name(), "embedding cache enabled");
        Arc::new(CachedProvider::new(gemini, backend).with_ttl(embedding.cache_ttl()))
    } else {
        Arc::new(gemini)
    };

    let store = MemoryRecordStore::with_persistence(&settings.store_path)
        .await
        .with_context(|| format!("failed to open {}", settings.store_path.display()))?;

    Ok(BookService::new(
        embedder,
        Arc::new(store),
        settings.service.clone(),
    ))
}

async fn cache_backend(settings: &Settings) -> Result<Arc<dyn CacheBackend>> {
    let Some(url) = settings.redis_url.as_deref() else {
        return Ok(Arc::new(MemoryCacheBackend::new(
            settings.service.embedding.cache_max_entries,
        )));
    };

    let redis = RedisCacheBackend::new(url).context("invalid redis URL")?;
    // An unreachable cache only costs extra embedding calls.
    let ctx = RequestContext::with_timeout(settings.request_timeout());
    if let Err(err) = redis.ping(&ctx).await {
        warn!(error = %err, "redis cache unreachable, continuing");
    }
    Ok(Arc::new(redis))
}

/// Run one command against `service` and return its JSON output.
pub async fn execute(
    service: &BookService,
    ctx: &RequestContext,
    command: Commands,
) -> Result<Value> {
    match command {
        Commands::Add {
            title,
            description,
            external_id,
        } => {
            let mut book = NewBook::new(title, description);
            if let Some(external_id) = external_id {
                book = book.with_external_id(external_id);
            }
            let record = service
                .add_record(ctx, book)
                .await
                .map_err(describe)
                .context("failed to add book")?;
            Ok(serde_json::to_value(AddedBook::from(&record))?)
        }
        Commands::Search { query, limit } => {
            if query.trim().is_empty() {
                bail!("query must not be empty");
            }
            let mut results = service
                .search_records(ctx, &query)
                .await
                .map_err(describe)
                .context("search failed")?;
            if let Some(limit) = limit.filter(|&limit| limit > 0) {
                results.truncate(limit);
            }
            Ok(serde_json::to_value(results)?)
        }
    }
}

fn describe(err: ServiceError) -> anyhow::Error {
    if err.is_cancellation() {
        anyhow::Error::new(err).context("request cancelled or timed out")
    } else {
        anyhow::Error::new(err)
    }
}

/// Entry point shared by the binary: settings, logging, Ctrl-C, dispatch.
pub async fn run(cli: Cli) -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let settings = Settings::load(cli.config.as_deref())?.apply_cli(&cli);
    init_logging(settings.log_level.as_deref())?;

    let service = build_service(&settings).await?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });
    let ctx = RequestContext::from_token(token).child_with_timeout(settings.request_timeout());

    let output = execute(&service, &ctx, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
