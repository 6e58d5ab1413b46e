//! The batch record and its merge rules.
//!
//! A [`Batch`] is the authoritative view of one fanned-out request. The
//! engine reads it fresh from the record store, applies changes through
//! the methods here, and writes back a [`BatchPatch`].
//!
//! Invariants maintained by [`Batch::merge_outcome`]:
//!
//! - `seen_ids ⊆ job_ids` and `failed_ids ⊆ seen_ids`.
//! - `status == Completed` iff `job_ids` is non-empty and fully seen; the
//!   transition happens once and is never reversed.
//! - `outputs` only grows, one merge per job id.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job_status::JobOutcome;
use crate::sizing::{clamp_fanout, parse_size, Dimensions};
use crate::types::{BatchId, JobId, Timestamp};

/// Extension used for output filenames when the URL path has none.
const DEFAULT_OUTPUT_EXT: &str = "png";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created but never started.
    #[default]
    Idle,
    /// Jobs are being submitted or are in flight.
    Processing,
    /// Every submitted job has a merged terminal outcome.
    Completed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }

    /// Parse a stored status value. Unknown or empty values read as `Idle`.
    pub fn from_stored(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            _ => Self::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// One generated image attached to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputImage {
    pub url: String,
    /// `{job_id}-{index}.{ext}`; ties the output back to its job.
    pub filename: String,
}

impl OutputImage {
    /// Build an output entry named after the job that produced it.
    pub fn for_job(job_id: &str, index: usize, url: impl Into<String>) -> Self {
        let url = url.into();
        let ext = url_extension(&url).unwrap_or(DEFAULT_OUTPUT_EXT);
        let filename = format!("{job_id}-{index}.{ext}");
        Self { url, filename }
    }

    /// The job id encoded in the filename, if it follows the convention.
    pub fn job_id(&self) -> Option<&str> {
        self.filename.rsplit_once('-').map(|(job, _)| job)
    }
}

/// Extension of the last path segment of `url`, ignoring query/fragment.
/// The host of an absolute URL is never taken for a path segment.
fn url_extension(url: &str) -> Option<&str> {
    let url = url.split(['?', '#']).next()?;
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.split_once('/')?.1,
        None => url,
    };
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A batch as stored in the record store.
///
/// Input fields (`prompt`, `subject_image_ref`, `size`, `requested_fanout`)
/// are written by whoever creates the record and are kept raw; they are
/// validated by [`Batch::inputs`] when the batch is started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub prompt: Option<String>,
    pub subject_image_ref: Option<String>,
    pub size: Option<String>,
    pub requested_fanout: Option<i64>,
    pub status: BatchStatus,
    pub job_ids: BTreeSet<JobId>,
    pub seen_ids: BTreeSet<JobId>,
    pub failed_ids: BTreeSet<JobId>,
    pub outputs: Vec<OutputImage>,
    pub last_update: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Store-assigned revision, bumped on every write. Used for
    /// compare-and-set.
    pub version: u64,
}

/// Validated inputs needed to fan a batch out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInputs {
    pub prompt: String,
    pub subject_image_ref: String,
    pub dimensions: Dimensions,
    pub fanout: usize,
}

/// Result of applying a terminal outcome to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// The outcome was applied. `completed` is true when this merge
    /// performed the `processing -> completed` transition.
    Merged { completed: bool },
    /// The job was already seen; nothing changed.
    Duplicate,
    /// The job is not part of this batch's job set; nothing changed.
    UnknownJob,
}

impl Batch {
    pub fn new(id: impl Into<BatchId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Validate and derive the fan-out inputs.
    ///
    /// A missing or blank prompt or subject reference is a
    /// [`CoreError::Validation`].
    pub fn inputs(&self) -> Result<BatchInputs, CoreError> {
        let prompt = non_blank(self.prompt.as_deref()).ok_or_else(|| {
            CoreError::Validation(format!("Batch {} has no prompt", self.id))
        })?;
        let subject_image_ref = non_blank(self.subject_image_ref.as_deref()).ok_or_else(|| {
            CoreError::Validation(format!("Batch {} has no subject image", self.id))
        })?;

        Ok(BatchInputs {
            prompt: prompt.to_string(),
            subject_image_ref: subject_image_ref.to_string(),
            dimensions: parse_size(self.size.as_deref()),
            fanout: clamp_fanout(self.requested_fanout),
        })
    }

    /// True when every submitted job has been seen.
    pub fn is_fully_accounted(&self) -> bool {
        !self.job_ids.is_empty() && self.job_ids.is_subset(&self.seen_ids)
    }

    /// Job ids submitted but not yet seen.
    pub fn pending_job_ids(&self) -> impl Iterator<Item = &JobId> {
        self.job_ids.difference(&self.seen_ids)
    }

    /// Apply one job's terminal outcome.
    ///
    /// Appends outputs and records the job as seen (and failed, for a
    /// failure) unless the job is unknown or already seen. Re-evaluates
    /// completion afterwards.
    pub fn merge_outcome(
        &mut self,
        job_id: &str,
        outcome: &JobOutcome,
        now: Timestamp,
    ) -> MergeResult {
        if !self.job_ids.contains(job_id) {
            return MergeResult::UnknownJob;
        }
        if self.seen_ids.contains(job_id) {
            return MergeResult::Duplicate;
        }

        self.outputs.extend(
            outcome
                .output_urls()
                .iter()
                .enumerate()
                .map(|(i, url)| OutputImage::for_job(job_id, i, url.as_str())),
        );
        self.seen_ids.insert(job_id.to_string());
        if outcome.is_failure() {
            self.failed_ids.insert(job_id.to_string());
        }
        self.last_update = Some(now);

        let completed = self.status != BatchStatus::Completed && self.is_fully_accounted();
        if completed {
            self.status = BatchStatus::Completed;
            self.completed_at = Some(now);
        }

        MergeResult::Merged { completed }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &BatchPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ids) = &patch.job_ids {
            self.job_ids = ids.clone();
        }
        if let Some(ids) = &patch.seen_ids {
            self.seen_ids = ids.clone();
        }
        if let Some(ids) = &patch.failed_ids {
            self.failed_ids = ids.clone();
        }
        if let Some(outputs) = &patch.outputs {
            self.outputs = outputs.clone();
        }
        if let Some(ts) = patch.last_update {
            self.last_update = Some(ts);
        }
        if let Some(ts) = patch.completed_at {
            self.completed_at = ts;
        }
    }

    /// Check the set and status invariants.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        if !self.seen_ids.is_subset(&self.job_ids) {
            return Err(CoreError::Internal(format!(
                "Batch {}: seen ids are not a subset of job ids",
                self.id
            )));
        }
        if !self.failed_ids.is_subset(&self.seen_ids) {
            return Err(CoreError::Internal(format!(
                "Batch {}: failed ids are not a subset of seen ids",
                self.id
            )));
        }
        let completed = self.status == BatchStatus::Completed;
        if completed != self.is_fully_accounted() {
            return Err(CoreError::Internal(format!(
                "Batch {}: status {} disagrees with job accounting",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A partial write to a batch record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchPatch {
    pub status: Option<BatchStatus>,
    pub job_ids: Option<BTreeSet<JobId>>,
    pub seen_ids: Option<BTreeSet<JobId>>,
    pub failed_ids: Option<BTreeSet<JobId>>,
    pub outputs: Option<Vec<OutputImage>>,
    pub last_update: Option<Timestamp>,
    /// `Some(None)` clears the field.
    pub completed_at: Option<Option<Timestamp>>,
}

impl BatchPatch {
    /// Reset the mutable fields at the start of a fan-out.
    pub fn reset(now: Timestamp) -> Self {
        Self {
            status: Some(BatchStatus::Processing),
            job_ids: Some(BTreeSet::new()),
            seen_ids: Some(BTreeSet::new()),
            failed_ids: Some(BTreeSet::new()),
            last_update: Some(now),
            completed_at: Some(None),
            ..Default::default()
        }
    }

    /// Persist the finalized job id set.
    pub fn job_ids(ids: BTreeSet<JobId>, now: Timestamp) -> Self {
        Self {
            job_ids: Some(ids),
            last_update: Some(now),
            ..Default::default()
        }
    }

    /// Every field the reconciler may change, taken from a merged batch.
    pub fn merged_from(batch: &Batch) -> Self {
        Self {
            status: Some(batch.status),
            seen_ids: Some(batch.seen_ids.clone()),
            failed_ids: Some(batch.failed_ids.clone()),
            outputs: Some(batch.outputs.clone()),
            last_update: batch.last_update,
            completed_at: Some(batch.completed_at),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
