//! Record types.

use chrono::{DateTime, Utc};
use semsearch_embeddings::Embedding;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage-assigned record identifier.
pub type RecordId = Uuid;

/// A stored book with its description embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier, assigned by storage.
    pub id: RecordId,

    /// Optional external identifier such as an ISBN; unique when present.
    pub external_id: Option<String>,

    /// Title.
    pub title: String,

    /// Free-text description; this is the embedded field.
    pub description: String,

    /// Embedding of `description`.
    pub embedding: Embedding,

    /// When storage accepted the record.
    pub created_at: DateTime<Utc>,
}

/// A record ready to be persisted, embedding included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub embedding: Embedding,
}

/// Input to [`crate::BookService::add_record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    /// Optional external identifier.
    pub external_id: Option<String>,

    /// Title (must not be blank).
    pub title: String,

    /// Description to embed.
    pub description: String,
}

impl NewBook {
    /// Create a book without an external identifier.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            external_id: None,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Set the external identifier.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// A search hit: the record's public fields plus its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub id: RecordId,
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,

    /// Cosine similarity in [-1, 1].
    pub similarity: f64,
}

impl SimilarityResult {
    /// Annotate a record with its score, dropping the stored vector.
    pub fn from_record(record: Record, similarity: f64) -> Self {
        Self {
            id: record.id,
            external_id: record.external_id,
            title: record.title,
            description: record.description,
            created_at: record.created_at,
            similarity,
        }
    }
}
