//! Batch coordinator: fans a batch out into jobs.
//!
//! Submissions are paced and sequential to stay under the job service's
//! rate limits. Each accepted job is registered and gets its poller
//! immediately; rejected submissions are logged and skipped. The
//! accepted job ids are persisted in a single write once the loop ends.
//! That write is retried on transient store failures; if it still fails,
//! the pollers of this fan-out are cancelled and the error is returned.
//!
//! The batch lock is held from the reset write to the job id write, so an
//! outcome that arrives before the job set is persisted waits for it.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fanout_core::batch::BatchPatch;
use fanout_core::types::{BatchId, JobId};
use fanout_jobs::{AssetEncoder, JobService, JobSpec};
use fanout_store::{RecordStore, StoreError};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::WriteRetry;
use crate::error::EngineError;
use crate::events::BatchEvent;
use crate::locks::BatchLocks;
use crate::poller::PollerSpawner;
use crate::registry::JobRegistry;

/// Result of starting a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionSummary {
    pub batch_id: BatchId,
    /// Jobs the fan-out attempted (after clamping).
    pub requested: usize,
    /// Jobs the service accepted.
    pub submitted: usize,
    pub job_ids: BTreeSet<JobId>,
}

pub struct Coordinator {
    store: Arc<dyn RecordStore>,
    jobs: Arc<dyn JobService>,
    assets: Arc<dyn AssetEncoder>,
    registry: Arc<JobRegistry>,
    locks: Arc<BatchLocks>,
    pollers: PollerSpawner,
    event_tx: broadcast::Sender<BatchEvent>,
    submit_pacing: Duration,
    notify_url: Option<String>,
    write_retry: WriteRetry,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RecordStore>,
        jobs: Arc<dyn JobService>,
        assets: Arc<dyn AssetEncoder>,
        registry: Arc<JobRegistry>,
        locks: Arc<BatchLocks>,
        pollers: PollerSpawner,
        event_tx: broadcast::Sender<BatchEvent>,
        submit_pacing: Duration,
        notify_url: Option<String>,
        write_retry: WriteRetry,
    ) -> Self {
        Self {
            store,
            jobs,
            assets,
            registry,
            locks,
            pollers,
            event_tx,
            submit_pacing,
            notify_url,
            write_retry,
        }
    }

    /// Validate a batch, reset it, and submit its jobs.
    ///
    /// Fails with a validation error (before any mutation) when the batch
    /// has no prompt or subject image. Individual submission failures do
    /// not fail the call.
    pub async fn start_batch(&self, batch_id: &str) -> Result<SubmissionSummary, EngineError> {
        let batch = self.store.read(batch_id).await?;
        let inputs = batch.inputs()?;
        let image = self.assets.encode(&inputs.subject_image_ref).await?;

        let _guard = self.locks.acquire(batch_id).await;
        self.store
            .write(batch_id, &BatchPatch::reset(Utc::now()), None)
            .await?;

        tracing::info!(
            batch_id,
            fanout = inputs.fanout,
            width = inputs.dimensions.width,
            height = inputs.dimensions.height,
            "Starting batch fan-out",
        );

        let fanout_cancel = self.pollers.group_token();
        let mut job_ids = BTreeSet::new();
        for index in 0..inputs.fanout {
            if index > 0 {
                tokio::time::sleep(self.submit_pacing).await;
            }

            let spec = JobSpec::new(
                inputs.prompt.clone(),
                image.clone(),
                inputs.dimensions,
                rand::random(),
            );
            match self.jobs.submit(&spec, self.notify_url.as_deref()).await {
                Ok(job_id) => {
                    tracing::info!(batch_id, job_id = %job_id, index, "Job submitted");
                    self.registry.register(job_id.clone(), batch_id).await;
                    self.pollers.spawn_under(&fanout_cancel, batch_id, &job_id);
                    self.publish(BatchEvent::JobSubmitted {
                        batch_id: batch_id.to_string(),
                        job_id: job_id.clone(),
                    });
                    job_ids.insert(job_id);
                }
                Err(e) => {
                    tracing::warn!(batch_id, index, error = %e, "Job submission failed, skipping");
                    self.publish(BatchEvent::JobSubmissionFailed {
                        batch_id: batch_id.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.persist_job_ids(batch_id, &job_ids).await {
            fanout_cancel.cancel();
            tracing::error!(
                batch_id,
                jobs = ?job_ids,
                error = %e,
                "Could not record job ids; cancelled this fan-out's pollers",
            );
            return Err(e.into());
        }

        if job_ids.is_empty() {
            tracing::warn!(
                batch_id,
                requested = inputs.fanout,
                "No jobs were accepted; batch stays processing",
            );
        }

        Ok(SubmissionSummary {
            batch_id: batch_id.to_string(),
            requested: inputs.fanout,
            submitted: job_ids.len(),
            job_ids,
        })
    }

    /// Write the accepted job id set, retrying transient failures.
    async fn persist_job_ids(
        &self,
        batch_id: &str,
        job_ids: &BTreeSet<JobId>,
    ) -> Result<(), StoreError> {
        let patch = BatchPatch::job_ids(job_ids.clone(), Utc::now());
        let mut attempt = 1;
        loop {
            match self.store.write(batch_id, &patch, None).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.write_retry.max_attempts => {
                    tracing::warn!(
                        batch_id,
                        attempt,
                        error = %e,
                        "Job id write failed, retrying",
                    );
                    tokio::time::sleep(self.write_retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn publish(&self, event: BatchEvent) {
        let _ = self.event_tx.send(event);
    }
}
