//! Per-job status poller: the guaranteed completion channel.
//!
//! One poller runs per submitted job. It fetches the job status every
//! `interval` until the job reaches a terminal state, then hands the
//! outcome to the reconciler exactly once and exits. A status fetch error
//! is treated as a terminal failure rather than retried. If nothing
//! terminal is observed within `deadline`, the job is reconciled as timed
//! out.

use std::sync::Arc;
use std::time::Duration;

use fanout_core::job_status::{FailureReason, JobOutcome};
use fanout_jobs::JobService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::reconciler::Reconciler;

/// The terminal phase a poller drove its job into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalPhase {
    Succeeded,
    Failed,
    TimedOut,
}

impl TerminalPhase {
    fn of(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded { .. } => Self::Succeeded,
            JobOutcome::Failed {
                reason: FailureReason::TimedOut,
            } => Self::TimedOut,
            JobOutcome::Failed { .. } => Self::Failed,
        }
    }
}

/// Polls one job to completion.
pub struct Poller {
    batch_id: String,
    job_id: String,
    jobs: Arc<dyn JobService>,
    reconciler: Arc<Reconciler>,
    interval: Duration,
    deadline: Duration,
    cancel: CancellationToken,
}

impl Poller {
    /// Run until the job is terminal and reconciled.
    ///
    /// Returns `None` if `cancel` fires first; the job is then left for
    /// restart recovery.
    pub async fn run(self) -> Option<TerminalPhase> {
        tracing::debug!(batch_id = %self.batch_id, job_id = %self.job_id, "Poller started");

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::info!(
                    batch_id = %self.batch_id,
                    job_id = %self.job_id,
                    "Poller cancelled",
                );
                return None;
            }
            result = tokio::time::timeout(self.deadline, self.poll_until_terminal()) => {
                result.unwrap_or_else(|_| {
                    tracing::warn!(
                        batch_id = %self.batch_id,
                        job_id = %self.job_id,
                        deadline_secs = self.deadline.as_secs(),
                        "Job did not finish before the poll deadline",
                    );
                    JobOutcome::Failed { reason: FailureReason::TimedOut }
                })
            }
        };

        let phase = TerminalPhase::of(&outcome);
        if let Err(e) = self
            .reconciler
            .reconcile(&self.batch_id, &self.job_id, &outcome)
            .await
        {
            tracing::error!(
                batch_id = %self.batch_id,
                job_id = %self.job_id,
                error = %e,
                "Failed to merge polled job outcome",
            );
        }
        Some(phase)
    }

    /// Fetch status until a terminal outcome is observed.
    async fn poll_until_terminal(&self) -> JobOutcome {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.jobs.get_status(&self.job_id).await {
                Ok(report) => {
                    if let Some(outcome) = JobOutcome::from_upstream(report.status, report.outputs)
                    {
                        tracing::info!(
                            batch_id = %self.batch_id,
                            job_id = %self.job_id,
                            status = %report.raw_status,
                            error = report.error.as_deref(),
                            attempt,
                            "Job reached a terminal state",
                        );
                        return outcome;
                    }
                    tracing::trace!(
                        job_id = %self.job_id,
                        status = %report.raw_status,
                        attempt,
                        "Job still running",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        batch_id = %self.batch_id,
                        job_id = %self.job_id,
                        error = %e,
                        "Status fetch failed, treating job as failed",
                    );
                    return JobOutcome::Failed {
                        reason: FailureReason::StatusFetch {
                            message: e.to_string(),
                        },
                    };
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Spawns pollers onto a shared task tracker.
#[derive(Clone)]
pub struct PollerSpawner {
    jobs: Arc<dyn JobService>,
    reconciler: Arc<Reconciler>,
    interval: Duration,
    deadline: Duration,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl PollerSpawner {
    pub fn new(
        jobs: Arc<dyn JobService>,
        reconciler: Arc<Reconciler>,
        interval: Duration,
        deadline: Duration,
        cancel: CancellationToken,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            jobs,
            reconciler,
            interval,
            deadline,
            cancel,
            tasks,
        }
    }

    /// Start polling `job_id` in the background. The deadline counts from now.
    pub fn spawn(&self, batch_id: &str, job_id: &str) -> JoinHandle<Option<TerminalPhase>> {
        self.spawn_under(&self.cancel, batch_id, job_id)
    }

    /// A token that cancels every poller spawned under it, and is itself
    /// cancelled on engine shutdown.
    pub fn group_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Like [`spawn`](Self::spawn), with the poller cancelled by `group`.
    pub fn spawn_under(
        &self,
        group: &CancellationToken,
        batch_id: &str,
        job_id: &str,
    ) -> JoinHandle<Option<TerminalPhase>> {
        let poller = Poller {
            batch_id: batch_id.to_string(),
            job_id: job_id.to_string(),
            jobs: Arc::clone(&self.jobs),
            reconciler: Arc::clone(&self.reconciler),
            interval: self.interval,
            deadline: self.deadline,
            cancel: group.child_token(),
        };
        self.tasks.spawn(poller.run())
    }
}
