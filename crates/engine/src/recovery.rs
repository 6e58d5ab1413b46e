//! Restart recovery for in-flight jobs.
//!
//! Pollers do not survive a restart. On startup every `processing` batch
//! gets a fresh poller for each job id that is submitted but not yet
//! seen, and those jobs are re-registered so push notifications resolve.

use fanout_core::batch::BatchStatus;
use fanout_store::RecordStore;

use crate::error::EngineError;
use crate::poller::PollerSpawner;
use crate::registry::JobRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Processing batches inspected.
    pub batches: usize,
    /// Pollers re-spawned.
    pub pollers: usize,
}

pub async fn recover_in_flight(
    store: &dyn RecordStore,
    registry: &JobRegistry,
    pollers: &PollerSpawner,
) -> Result<RecoverySummary, EngineError> {
    let batches = store.list_by_status(BatchStatus::Processing).await?;
    let mut summary = RecoverySummary {
        batches: batches.len(),
        ..Default::default()
    };

    for batch in &batches {
        for job_id in batch.pending_job_ids() {
            registry.register(job_id.clone(), batch.id.clone()).await;
            pollers.spawn(&batch.id, job_id);
            summary.pollers += 1;
        }
        if batch.job_ids.is_empty() {
            tracing::warn!(batch_id = %batch.id, "Processing batch has no jobs to recover");
        }
    }

    tracing::info!(
        batches = summary.batches,
        pollers = summary.pollers,
        "Recovered in-flight jobs",
    );
    Ok(summary)
}
