//! Record store access for batch records.
//!
//! The record store is the single source of truth for batch state. The
//! engine talks to it only through the [`RecordStore`] trait so the same
//! reconciliation code runs against the hosted table API
//! ([`HttpRecordStore`]) and the in-process store used in tests and
//! single-node deployments ([`InMemoryRecordStore`]).

pub mod error;
pub mod fields;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use fanout_core::batch::{Batch, BatchPatch, BatchStatus};

pub use error::StoreError;
pub use http::HttpRecordStore;
pub use memory::InMemoryRecordStore;

/// Read/write access to batch records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the current state of a batch.
    async fn read(&self, batch_id: &str) -> Result<Batch, StoreError>;

    /// Apply a partial update and return the record as written.
    ///
    /// When `expected_version` is set the write only succeeds if the
    /// stored record still carries that version; otherwise
    /// [`StoreError::Conflict`] is returned and nothing is written.
    async fn write(
        &self,
        batch_id: &str,
        patch: &BatchPatch,
        expected_version: Option<u64>,
    ) -> Result<Batch, StoreError>;

    /// Find the batch whose persisted job id set contains `job_id`.
    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Batch>, StoreError>;

    /// List all batches currently in `status`.
    async fn list_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, StoreError>;
}
