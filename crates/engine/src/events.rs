//! Batch lifecycle events broadcast by the engine.

use serde::Serialize;

/// Broadcast channel capacity for batch events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A job was accepted by the job service.
    JobSubmitted { batch_id: String, job_id: String },

    /// One submission of a fan-out was rejected and skipped.
    JobSubmissionFailed { batch_id: String, error: String },

    /// A job's terminal outcome was merged into its batch.
    JobReconciled {
        batch_id: String,
        job_id: String,
        failed: bool,
    },

    /// Every job of the batch has been accounted for.
    BatchCompleted {
        batch_id: String,
        job_count: usize,
        failed_count: usize,
        output_count: usize,
    },
}
