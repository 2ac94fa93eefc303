//! # Retrieval
//!
//! Semantic search over a collection of short text records ("books").
//!
//! - **Add**: embed a book's description and persist it
//! - **Search**: embed a query, fetch candidates from storage and re-rank
//!   them exactly by cosine similarity
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         BookService                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  add_record ─────► EmbeddingProvider ──► RecordStore::insert    │
//! │                                                                 │
//! │  search_records ─► EmbeddingProvider ──► RecordStore::candidates│
//! │                                  │                              │
//! │                                  ▼                              │
//! │                 cosine_similarity per candidate ──► ranked list │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semsearch_retrieval::{BookService, MemoryRecordStore, NewBook, ServiceConfig};
//!
//! let store = Arc::new(MemoryRecordStore::new());
//! let service = BookService::new(embedder, store, ServiceConfig::default());
//! service.add_record(&ctx, NewBook::new("Dune", "A desert planet, spice, prophecy.")).await?;
//! let results = service.search_records(&ctx, "space opera").await?;
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod service;
pub mod storage;

pub use config::{EmbeddingConfig, QueryConfig, ServiceConfig};
pub use error::{Result, ServiceError, StorageError};
pub use record::{NewBook, NewRecord, Record, RecordId, SimilarityResult};
pub use service::BookService;
pub use storage::{MemoryRecordStore, RecordStore, StorageResult};

// Re-export from dependencies for convenience
pub use semsearch_embeddings::{EmbeddingProvider, RequestContext};
