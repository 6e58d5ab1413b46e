//! Push listener: the best-effort completion channel.
//!
//! Handles one inbound job notification. Non-terminal statuses and jobs
//! that cannot be resolved to a batch are acknowledged without action;
//! the job's poller stays authoritative for them. Redelivery is safe
//! because the reconciler merges each job once.

use std::sync::Arc;

use fanout_core::batch::MergeResult;
use fanout_core::job_status::{JobOutcome, UpstreamStatus};
use fanout_store::RecordStore;

use crate::error::EngineError;
use crate::reconciler::Reconciler;
use crate::registry::JobRegistry;

/// An inbound job notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotification {
    pub job_id: String,
    pub status: String,
    pub outputs: Vec<String>,
}

/// Why a notification was acknowledged without a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The status is not terminal yet.
    NotTerminal,
    /// No batch owns the job.
    UnknownJob,
}

/// What handling a notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDisposition {
    Reconciled(MergeResult),
    Ignored(IgnoreReason),
}

pub struct PushListener {
    registry: Arc<JobRegistry>,
    store: Arc<dyn RecordStore>,
    reconciler: Arc<Reconciler>,
}

impl PushListener {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn RecordStore>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            registry,
            store,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        notification: &JobNotification,
    ) -> Result<PushDisposition, EngineError> {
        let job_id = notification.job_id.as_str();
        let status = UpstreamStatus::from_wire(&notification.status);

        let Some(outcome) = JobOutcome::from_upstream(status, notification.outputs.clone()) else {
            tracing::debug!(
                job_id,
                status = %notification.status,
                "Non-terminal notification ignored",
            );
            return Ok(PushDisposition::Ignored(IgnoreReason::NotTerminal));
        };

        let Some(batch_id) = self.resolve_batch(job_id).await? else {
            tracing::info!(job_id, "Notification for unknown job ignored");
            return Ok(PushDisposition::Ignored(IgnoreReason::UnknownJob));
        };

        let result = self.reconciler.reconcile(&batch_id, job_id, &outcome).await?;
        tracing::debug!(batch_id = %batch_id, job_id, ?result, "Notification handled");
        Ok(PushDisposition::Reconciled(result))
    }

    /// Registry first, then the persisted job sets (jobs submitted by an
    /// earlier process). A store hit is cached in the registry.
    async fn resolve_batch(&self, job_id: &str) -> Result<Option<String>, EngineError> {
        if let Some(batch_id) = self.registry.lookup(job_id).await {
            return Ok(Some(batch_id));
        }

        let found = self.store.find_by_job_id(job_id).await?;
        if let Some(batch) = &found {
            tracing::debug!(batch_id = %batch.id, job_id, "Job resolved from record store");
            self.registry.register(job_id, batch.id.clone()).await;
        }
        Ok(found.map(|b| b.id))
    }
}
