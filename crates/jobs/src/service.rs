//! The job service seam.

use async_trait::async_trait;
use fanout_core::job_status::UpstreamStatus;
use fanout_core::sizing::Dimensions;
use fanout_core::types::JobId;
use serde::Serialize;

use crate::api::JobServiceError;

/// Parameters for one generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    pub prompt: String,
    /// Subject image as a data URI.
    pub image: String,
    pub width: u32,
    pub height: u32,
    /// Per-job seed so sibling jobs of a batch produce distinct results.
    pub seed: u32,
}

impl JobSpec {
    pub fn new(prompt: String, image: String, dimensions: Dimensions, seed: u32) -> Self {
        Self {
            prompt,
            image,
            width: dimensions.width,
            height: dimensions.height,
            seed,
        }
    }
}

/// Current state of a job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusReport {
    pub status: UpstreamStatus,
    /// The status string exactly as received, for logging.
    pub raw_status: String,
    pub outputs: Vec<String>,
    pub error: Option<String>,
}

/// Submission and status lookup against the external generation service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Queue a job. `notify_target` is the webhook the service should call
    /// when the job finishes.
    async fn submit(
        &self,
        spec: &JobSpec,
        notify_target: Option<&str>,
    ) -> Result<JobId, JobServiceError>;

    /// Fetch the job's current status and outputs.
    async fn get_status(&self, job_id: &str) -> Result<JobStatusReport, JobServiceError>;
}
