//! Record storage.
//!
//! [`RecordStore`] is the contract the search service relies on. The bundled
//! [`MemoryRecordStore`] keeps records in memory and can mirror them to a JSON
//! file so a collection survives restarts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use semsearch_embeddings::RequestContext;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::record::{NewRecord, Record};

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence contract for records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record and return it with its assigned id.
    ///
    /// Fails with [`StorageError::DuplicateKey`] if the external id is taken.
    async fn insert_record(&self, ctx: &RequestContext, record: NewRecord)
    -> StorageResult<Record>;

    /// Look up a record by external id. `Ok(None)` when absent.
    async fn find_by_external_id(
        &self,
        ctx: &RequestContext,
        external_id: &str,
    ) -> StorageResult<Option<Record>>;

    /// Return candidate records, each with its full stored embedding, for
    /// exact re-ranking against `query`. Order is unspecified.
    async fn search_candidates(
        &self,
        ctx: &RequestContext,
        query: &[f32],
    ) -> StorageResult<Vec<Record>>;
}

/// In-memory record store with optional JSON persistence.
///
/// Candidate search is an exact full scan returning every record in insertion
/// order.
pub struct MemoryRecordStore {
    /// Records in insertion order.
    records: RwLock<Vec<Record>>,

    /// Path for persistent storage.
    path: Option<PathBuf>,
}

impl MemoryRecordStore {
    /// Create an empty, non-persistent store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Create a store backed by `path`, loading existing records if present.
    pub async fn with_persistence(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let records: Vec<Record> = serde_json::from_str(&content)?;
            info!("Loaded {} records from {}", records.len(), path.display());
            records
        } else {
            Vec::new()
        };

        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    /// Get the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Write all records to disk via a temp file and rename.
    async fn save(&self, records: &[Record]) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string(records)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;

        debug!("Saved {} records to disk", records.len());
        Ok(())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_record(
        &self,
        ctx: &RequestContext,
        record: NewRecord,
    ) -> StorageResult<Record> {
        let mut records = ctx.run(self.records.write()).await?;

        if let Some(external_id) = &record.external_id {
            if records
                .iter()
                .any(|r| r.external_id.as_deref() == Some(external_id.as_str()))
            {
                return Err(StorageError::DuplicateKey(external_id.clone()));
            }
        }

        let stored = Record {
            id: Uuid::new_v4(),
            external_id: record.external_id,
            title: record.title,
            description: record.description,
            embedding: record.embedding,
            created_at: Utc::now(),
        };

        // Last cancellation point; the save below always runs to completion.
        ctx.check()?;
        records.push(stored.clone());

        if let Err(err) = self.save(&records).await {
            records.pop();
            return Err(err);
        }

        debug!(id = %stored.id, title = %stored.title, "inserted record");
        Ok(stored)
    }

    async fn find_by_external_id(
        &self,
        ctx: &RequestContext,
        external_id: &str,
    ) -> StorageResult<Option<Record>> {
        let records = ctx.run(self.records.read()).await?;
        Ok(records
            .iter()
            .find(|r| r.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn search_candidates(
        &self,
        ctx: &RequestContext,
        _query: &[f32],
    ) -> StorageResult<Vec<Record>> {
        let records = ctx.run(self.records.read()).await?;
        Ok(records.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn new_record(external_id: Option<&str>, title: &str) -> NewRecord {
        NewRecord {
            external_id: external_id.map(str::to_string),
            title: title.to_string(),
            description: format!("{title} description"),
            embedding: vec![1.0, 0.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_keeps_order() {
        let store = MemoryRecordStore::new();
        let ctx = RequestContext::background();

        let a = store.insert_record(&ctx, new_record(None, "a")).await.unwrap();
        let b = store.insert_record(&ctx, new_record(None, "b")).await.unwrap();
        assert_ne!(a.id, b.id);

        let candidates = store.search_candidates(&ctx, &[1.0, 0.0, 0.0]).await.unwrap();
        let titles: Vec<_> = candidates.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_duplicate_external_id() {
        let store = MemoryRecordStore::new();
        let ctx = RequestContext::background();

        store
            .insert_record(&ctx, new_record(Some("isbn-1"), "a"))
            .await
            .unwrap();
        let err = store
            .insert_record(&ctx, new_record(Some("isbn-1"), "b"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateKey(id) if id == "isbn-1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_records_without_external_id_never_clash() {
        let store = MemoryRecordStore::new();
        let ctx = RequestContext::background();

        store.insert_record(&ctx, new_record(None, "a")).await.unwrap();
        store.insert_record(&ctx, new_record(None, "a")).await.unwrap();

        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_find_by_external_id() {
        let store = MemoryRecordStore::new();
        let ctx = RequestContext::background();
        store
            .insert_record(&ctx, new_record(Some("isbn-1"), "a"))
            .await
            .unwrap();

        let found = store.find_by_external_id(&ctx, "isbn-1").await.unwrap();
        assert_eq!(found.map(|r| r.title), Some("a".to_string()));

        let missing = store.find_by_external_id(&ctx, "isbn-2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let store = MemoryRecordStore::new();
        let ctx = RequestContext::background();
        ctx.cancel();

        let err = store.search_candidates(&ctx, &[]).await.unwrap_err();
        assert!(matches!(err, StorageError::Cancelled));
        assert!(store.insert_record(&ctx, new_record(None, "a")).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("books").join("records.json");
        let ctx = RequestContext::background();

        let id;
        {
            let store = MemoryRecordStore::with_persistence(&path).await.unwrap();
            let record = store
                .insert_record(&ctx, new_record(Some("isbn-1"), "Dune"))
                .await
                .unwrap();
            id = record.id;
        }

        // Reload and verify
        {
            let store = MemoryRecordStore::with_persistence(&path).await.unwrap();
            let record = store
                .find_by_external_id(&ctx, "isbn-1")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(record.id, id);
            assert_eq!(record.embedding, vec![1.0, 0.0, 0.0]);
        }
    }
    #[tokio::test]
    async fn test_deadline_during_save_keeps_disk_and_memory_in_sync() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        let preloaded: Vec<Record> = (0..1500)
            .map(|i| Record {
                id: Uuid::new_v4(),
                external_id: None,
                title: format!("book {i}"),
                description: String::new(),
                embedding: vec![0.5; 768],
                created_at: Utc::now(),
            })
            .collect();
        std::fs::write(&path, serde_json::to_string(&preloaded).unwrap()).unwrap();

        let store = MemoryRecordStore::with_persistence(&path).await.unwrap();
        for attempt in 0..8u64 {
            let external_id = format!("isbn-{attempt}");
            let ctx = RequestContext::with_timeout(Duration::from_millis(2 + attempt * 5));
            let result = store
                .insert_record(&ctx, new_record(Some(&external_id), "late"))
                .await;

            // Leave time for any write still running in the background.
            tokio::time::sleep(Duration::from_millis(50)).await;

            let background = RequestContext::background();
            let in_memory = store
                .find_by_external_id(&background, &external_id)
                .await
                .unwrap()
                .is_some();
            let reloaded = MemoryRecordStore::with_persistence(&path).await.unwrap();
            let on_disk = reloaded
                .find_by_external_id(&background, &external_id)
                .await
                .unwrap()
                .is_some();

            assert_eq!(in_memory, result.is_ok(), "attempt {attempt}: {result:?}");
            assert_eq!(on_disk, in_memory, "attempt {attempt}: {result:?}");
        }
    }
}
