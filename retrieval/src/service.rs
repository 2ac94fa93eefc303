//! Record service: add and search books.

use std::sync::Arc;

use ordered_float::OrderedFloat;
use semsearch_embeddings::{EmbeddingError, EmbeddingProvider, RequestContext, cosine_similarity};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError, StorageError};
use crate::record::{NewBook, NewRecord, Record, SimilarityResult};
use crate::storage::RecordStore;

/// Embeds book descriptions on the way in and ranks stored books against a
/// query on the way out.
pub struct BookService {
    /// Embedding provider, usually a cache in front of a remote client.
    embedder: Arc<dyn EmbeddingProvider>,

    /// Record storage.
    store: Arc<dyn RecordStore>,

    /// Configuration.
    config: ServiceConfig,
}

impl BookService {
    /// Create a new service.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RecordStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Embed the book's description and store it.
    ///
    /// Either the record is persisted with a valid embedding or nothing is.
    pub async fn add_record(&self, ctx: &RequestContext, book: NewBook) -> Result<Record> {
        if book.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("title must not be empty".to_string()));
        }

        if let Some(external_id) = &book.external_id {
            let existing = self
                .store
                .find_by_external_id(ctx, external_id)
                .await
                .map_err(ServiceError::StorageFailed)?;
            if existing.is_some() {
                return Err(ServiceError::AlreadyExists(external_id.clone()));
            }
        }

        let embedding = self
            .embedder
            .embed(ctx, &book.description)
            .await
            .map_err(ServiceError::EmbeddingFailed)?;

        if embedding.len() != self.config.dimension {
            error!(
                expected = self.config.dimension,
                actual = embedding.len(),
                "embedding has wrong dimensionality"
            );
            return Err(ServiceError::EmbeddingFailed(EmbeddingError::LengthMismatch {
                left: self.config.dimension,
                right: embedding.len(),
            }));
        }

        let record = NewRecord {
            external_id: book.external_id,
            title: book.title,
            description: book.description,
            embedding,
        };

        match self.store.insert_record(ctx, record).await {
            Ok(stored) => {
                info!(id = %stored.id, title = %stored.title, "added book");
                Ok(stored)
            }
            Err(StorageError::DuplicateKey(external_id)) => {
                Err(ServiceError::AlreadyExists(external_id))
            }
            Err(err) => {
                error!(error = %err, "failed to insert book");
                Err(ServiceError::StorageFailed(err))
            }
        }
    }

    /// Rank stored books by cosine similarity to `query`.
    ///
    /// Assumes a non-empty query. Candidates whose vectors cannot be compared
    /// with the query (wrong length, zero norm) are skipped. Cancellation is
    /// checked before any work and before scoring each candidate.
    pub async fn search_records(
        &self,
        ctx: &RequestContext,
        query: &str,
    ) -> Result<Vec<SimilarityResult>> {
        ctx.check()?;

        let query_vector = self.embedder.embed(ctx, query).await.map_err(|err| {
            error!(query, error = %err, "embedding failed");
            ServiceError::EmbeddingFailed(err)
        })?;

        let storage_ctx = ctx.child_with_timeout(self.config.storage_timeout());
        let candidates = self
            .store
            .search_candidates(&storage_ctx, &query_vector)
            .await
            .map_err(|err| {
                if matches!(err, StorageError::TimedOut) {
                    error!(query, "candidate search timed out");
                } else {
                    error!(query, error = %err, "candidate search failed");
                }
                ServiceError::StorageFailed(err)
            })?;

        let total = candidates.len();
        let mut results = Vec::with_capacity(total);
        for record in candidates {
            ctx.check()?;

            match cosine_similarity(&query_vector, &record.embedding) {
                Ok(similarity) => results.push(SimilarityResult::from_record(record, similarity)),
                Err(err) => {
                    warn!(id = %record.id, error = %err, "failed to compute similarity");
                }
            }
        }

        if self.config.query.sort_by_similarity {
            results.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.similarity)));
        }
        if self.config.query.max_results > 0 {
            results.truncate(self.config.query.max_results);
        }

        debug!(
            query,
            candidates = total,
            results = results.len(),
            "search complete"
        );
        Ok(results)
    }
}
