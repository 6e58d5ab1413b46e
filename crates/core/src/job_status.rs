//! Job status vocabulary and terminal outcomes.
//!
//! The job service reports free-form status strings. Both completion
//! channels (poller and push webhook) normalize them through
//! [`UpstreamStatus::from_wire`] so they agree on what "terminal" means.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upstream status
// ---------------------------------------------------------------------------

/// Wire values treated as a successful terminal state.
const SUCCEEDED_VALUES: &[&str] = &["succeeded", "successful", "completed", "complete"];

/// Wire values treated as a failed terminal state.
const FAILED_VALUES: &[&str] = &["failed", "error", "canceled", "cancelled"];

/// Normalized job status as reported by the job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamStatus {
    /// Queued, starting, running, or any unrecognized value.
    Processing,
    Succeeded,
    Failed,
}

impl UpstreamStatus {
    /// Map a raw status string to the normalized vocabulary.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unrecognized values map to [`UpstreamStatus::Processing`].
    pub fn from_wire(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        if SUCCEEDED_VALUES.contains(&normalized.as_str()) {
            Self::Succeeded
        } else if FAILED_VALUES.contains(&normalized.as_str()) {
            Self::Failed
        } else {
            Self::Processing
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Terminal outcome
// ---------------------------------------------------------------------------

/// Why a job ended in failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The job service reported a failed/cancelled status.
    Upstream,
    /// Fetching the job status failed; the poller does not retry these.
    StatusFetch { message: String },
    /// No terminal status was observed before the poll deadline.
    TimedOut,
}

/// The terminal outcome of one job, applied to its batch by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The job finished and produced zero or more output URLs.
    Succeeded { outputs: Vec<String> },
    /// The job finished without usable output.
    Failed { reason: FailureReason },
}

impl JobOutcome {
    /// Build the outcome for an upstream terminal status.
    ///
    /// Returns `None` for [`UpstreamStatus::Processing`], which is not
    /// terminal.
    pub fn from_upstream(status: UpstreamStatus, outputs: Vec<String>) -> Option<Self> {
        match status {
            UpstreamStatus::Succeeded => Some(Self::Succeeded { outputs }),
            UpstreamStatus::Failed => Some(Self::Failed {
                reason: FailureReason::Upstream,
            }),
            UpstreamStatus::Processing => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Output URLs carried by the outcome (empty on failure).
    pub fn output_urls(&self) -> &[String] {
        match self {
            Self::Succeeded { outputs } => outputs,
            Self::Failed { .. } => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
