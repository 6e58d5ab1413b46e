//! Completion reconciler: the single merge path for job outcomes.
//!
//! Both the poller and the push listener call [`Reconciler::reconcile`].
//! Each call re-reads the batch, merges the outcome with
//! [`Batch::merge_outcome`], and writes the result back with a
//! compare-and-set on the record version. Calls for the same batch are
//! serialized in-process by [`BatchLocks`]; the version check covers
//! writers in other processes. A duplicate or stale outcome leaves the
//! record untouched, so the effect on `outputs`/`seen_ids` is exactly
//! once per job id.
//!
//! [`Batch::merge_outcome`]: fanout_core::batch::Batch::merge_outcome

use std::sync::Arc;

use chrono::Utc;
use fanout_core::batch::{BatchPatch, MergeResult};
use fanout_core::job_status::JobOutcome;
use fanout_store::{RecordStore, StoreError};
use tokio::sync::broadcast;

use crate::config::WriteRetry;
use crate::error::ReconcileError;
use crate::events::BatchEvent;
use crate::locks::BatchLocks;

pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    locks: Arc<BatchLocks>,
    event_tx: broadcast::Sender<BatchEvent>,
    retry: WriteRetry,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        locks: Arc<BatchLocks>,
        event_tx: broadcast::Sender<BatchEvent>,
        retry: WriteRetry,
    ) -> Self {
        Self {
            store,
            locks,
            event_tx,
            retry,
        }
    }

    /// Merge one job's terminal outcome into its batch.
    ///
    /// Returns what the merge did. A version conflict or a transient store
    /// failure triggers a fresh read and another attempt; any other store
    /// error is returned immediately.
    pub async fn reconcile(
        &self,
        batch_id: &str,
        job_id: &str,
        outcome: &JobOutcome,
    ) -> Result<MergeResult, ReconcileError> {
        let _guard = self.locks.acquire(batch_id).await;

        for attempt in 1..=self.retry.max_attempts {
            match self.try_merge(batch_id, job_id, outcome).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_conflict() || e.is_transient() => {
                    tracing::warn!(
                        batch_id,
                        job_id,
                        attempt,
                        error = %e,
                        "Merge attempt failed, retrying",
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ReconcileError::RetriesExhausted {
            batch_id: batch_id.to_string(),
            job_id: job_id.to_string(),
            attempts: self.retry.max_attempts,
        })
    }

    /// One read-merge-write pass. Caller holds the batch lock.
    async fn try_merge(
        &self,
        batch_id: &str,
        job_id: &str,
        outcome: &JobOutcome,
    ) -> Result<MergeResult, StoreError> {
        let mut batch = self.store.read(batch_id).await?;
        let expected_version = batch.version;

        let result = batch.merge_outcome(job_id, outcome, Utc::now());
        match result {
            MergeResult::Duplicate => {
                tracing::debug!(batch_id, job_id, "Duplicate terminal outcome ignored");
                return Ok(result);
            }
            MergeResult::UnknownJob => {
                tracing::warn!(
                    batch_id,
                    job_id,
                    "Outcome for a job outside the batch's job set ignored",
                );
                return Ok(result);
            }
            MergeResult::Merged { .. } => {}
        }

        let patch = BatchPatch::merged_from(&batch);
        let written = self
            .store
            .write(batch_id, &patch, Some(expected_version))
            .await?;

        tracing::info!(
            batch_id,
            job_id,
            failed = outcome.is_failure(),
            seen = written.seen_ids.len(),
            total = written.job_ids.len(),
            "Job outcome merged",
        );
        self.publish(BatchEvent::JobReconciled {
            batch_id: batch_id.to_string(),
            job_id: job_id.to_string(),
            failed: outcome.is_failure(),
        });
        if matches!(result, MergeResult::Merged { completed: true }) {
            tracing::info!(
                batch_id,
                failed = written.failed_ids.len(),
                outputs = written.outputs.len(),
                "Batch completed",
            );
            self.publish(BatchEvent::BatchCompleted {
                batch_id: batch_id.to_string(),
                job_count: written.job_ids.len(),
                failed_count: written.failed_ids.len(),
                output_count: written.outputs.len(),
            });
        }
        Ok(result)
    }

    fn publish(&self, event: BatchEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.event_tx.send(event);
    }
}
