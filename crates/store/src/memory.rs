//! In-process record store with versioned compare-and-set writes.

use std::collections::HashMap;

use async_trait::async_trait;
use fanout_core::batch::{Batch, BatchPatch, BatchStatus};
use tokio::sync::RwLock;

use crate::{RecordStore, StoreError};

/// Record store held entirely in memory.
///
/// Every successful write bumps the record's `version`, so conditional
/// writes behave like the hosted store's would under contention.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, Batch>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. The stored version starts at 1.
    pub async fn insert(&self, mut batch: Batch) {
        batch.version = batch.version.max(1);
        self.records.write().await.insert(batch.id.clone(), batch);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn read(&self, batch_id: &str) -> Result<Batch, StoreError> {
        self.records
            .read()
            .await
            .get(batch_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(batch_id.to_string()))
    }

    async fn write(
        &self,
        batch_id: &str,
        patch: &BatchPatch,
        expected_version: Option<u64>,
    ) -> Result<Batch, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(batch_id)
            .ok_or_else(|| StoreError::NotFound(batch_id.to_string()))?;

        if let Some(expected) = expected_version {
            if record.version != expected {
                return Err(StoreError::Conflict {
                    id: batch_id.to_string(),
                    expected,
                    actual: record.version,
                });
            }
        }

        record.apply(patch);
        record.version += 1;
        Ok(record.clone())
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Batch>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|b| b.job_ids.contains(job_id))
            .cloned())
    }

    async fn list_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, StoreError> {
        let mut batches: Vec<Batch> = self
            .records
            .read()
            .await
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        batches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn read_missing_record_is_not_found() {
        let store = InMemoryRecordStore::new();
        let err = store.read("nope").await.unwrap_err();
        assert_matches!(err, StoreError::NotFound(ref id) if id == "nope");
    }

    #[tokio::test]
    async fn write_bumps_version() {
        let store = InMemoryRecordStore::new();
        store.insert(Batch::new("rec1")).await;

        let written = store
            .write("rec1", &BatchPatch::reset(Utc::now()), None)
            .await
            .unwrap();
        assert_eq!(written.version, 2);
        assert_eq!(written.status, BatchStatus::Processing);
    }

    #[tokio::test]
    async fn stale_conditional_write_conflicts() {
        let store = InMemoryRecordStore::new();
        store.insert(Batch::new("rec1")).await;

        store
            .write("rec1", &BatchPatch::reset(Utc::now()), Some(1))
            .await
            .unwrap();
        let err = store
            .write("rec1", &BatchPatch::reset(Utc::now()), Some(1))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            StoreError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        );
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn finds_batch_by_job_id() {
        let store = InMemoryRecordStore::new();
        let mut batch = Batch::new("rec1");
        batch.job_ids.insert("job-a".into());
        store.insert(batch).await;
        store.insert(Batch::new("rec2")).await;

        let found = store.find_by_job_id("job-a").await.unwrap();
        assert_eq!(found.map(|b| b.id), Some("rec1".to_string()));
        assert!(store.find_by_job_id("job-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_by_status() {
        let store = InMemoryRecordStore::new();
        let mut processing = Batch::new("rec2");
        processing.status = BatchStatus::Processing;
        store.insert(processing).await;
        store.insert(Batch::new("rec1")).await;

        let listed = store.list_by_status(BatchStatus::Processing).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "rec2");
        assert_eq!(store.len().await, 2);
    }
}
