//! Shared fakes and helpers for engine integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fanout_core::batch::{Batch, BatchPatch, BatchStatus};
use fanout_core::job_status::UpstreamStatus;
use fanout_engine::{Engine, EngineConfig};
use fanout_jobs::{AssetEncoder, AssetError, JobService, JobServiceError, JobSpec, JobStatusReport};
use fanout_store::{InMemoryRecordStore, RecordStore, StoreError};

// ---------------------------------------------------------------------------
// Fake job service
// ---------------------------------------------------------------------------

/// How a fake job answers status fetches.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Never reaches a terminal state.
    Running,
    /// Reports `succeeded` with `outputs` from the `after`-th fetch on.
    SucceedAfter { after: usize, outputs: Vec<String> },
    /// Reports `failed` from the `after`-th fetch on.
    FailAfter { after: usize },
    /// Every fetch errors.
    FetchError,
}

/// Job service fake. The n-th submission (1-based) gets id `job-n`.
pub struct FakeJobService {
    submissions: AtomicUsize,
    rejected: Mutex<HashSet<usize>>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    default_behavior: Mutex<Behavior>,
    fetches: Mutex<HashMap<String, usize>>,
    specs: Mutex<Vec<(JobSpec, Option<String>)>>,
}

impl FakeJobService {
    pub fn new(default_behavior: Behavior) -> Self {
        Self {
            submissions: AtomicUsize::new(0),
            rejected: Mutex::new(HashSet::new()),
            behaviors: Mutex::new(HashMap::new()),
            default_behavior: Mutex::new(default_behavior),
            fetches: Mutex::new(HashMap::new()),
            specs: Mutex::new(Vec::new()),
        }
    }

    /// Reject the n-th submission (1-based).
    pub fn reject_submission(&self, ordinal: usize) {
        self.rejected.lock().unwrap().insert(ordinal);
    }

    pub fn set_behavior(&self, job_id: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(job_id.to_string(), behavior);
    }

    /// Submission attempts so far, accepted or not.
    pub fn submission_attempts(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn accepted_specs(&self) -> Vec<(JobSpec, Option<String>)> {
        self.specs.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, job_id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    fn report(status: &str, outputs: Vec<String>) -> JobStatusReport {
        JobStatusReport {
            status: UpstreamStatus::from_wire(status),
            raw_status: status.to_string(),
            outputs,
            error: None,
        }
    }
}

#[async_trait]
impl JobService for FakeJobService {
    async fn submit(
        &self,
        spec: &JobSpec,
        notify_target: Option<&str>,
    ) -> Result<String, JobServiceError> {
        let ordinal = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.rejected.lock().unwrap().contains(&ordinal) {
            return Err(JobServiceError::ApiError {
                status: 429,
                body: "rate limited".into(),
            });
        }
        self.specs
            .lock()
            .unwrap()
            .push((spec.clone(), notify_target.map(str::to_string)));
        Ok(format!("job-{ordinal}"))
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatusReport, JobServiceError> {
        let fetch = {
            let mut fetches = self.fetches.lock().unwrap();
            let count = fetches.entry(job_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.lock().unwrap().clone());

        match behavior {
            Behavior::Running => Ok(Self::report("processing", vec![])),
            Behavior::SucceedAfter { after, outputs } if fetch >= after => {
                Ok(Self::report("succeeded", outputs))
            }
            Behavior::FailAfter { after } if fetch >= after => Ok(Self::report("failed", vec![])),
            Behavior::SucceedAfter { .. } | Behavior::FailAfter { .. } => {
                Ok(Self::report("starting", vec![]))
            }
            Behavior::FetchError => Err(JobServiceError::ApiError {
                status: 502,
                body: "bad gateway".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fake asset encoder
// ---------------------------------------------------------------------------

pub struct StubAssets;

#[async_trait]
impl AssetEncoder for StubAssets {
    async fn encode(&self, reference: &str) -> Result<String, AssetError> {
        if reference.contains("missing") {
            return Err(AssetError::HttpStatus {
                status: 404,
                url: reference.to_string(),
            });
        }
        Ok("data:image/png;base64,iVBORw0KGgo=".to_string())
    }
}

// ---------------------------------------------------------------------------
// Record store with injectable outages
// ---------------------------------------------------------------------------

/// Wraps the in-memory store and answers scripted writes with a 503
/// without applying them.
pub struct FaultyStore {
    inner: Arc<InMemoryRecordStore>,
    merge_failures: AtomicUsize,
    job_id_failures: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryRecordStore>) -> Self {
        Self {
            inner,
            merge_failures: AtomicUsize::new(0),
            job_id_failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` conditional (merge) writes.
    pub fn fail_next_merges(&self, n: usize) {
        self.merge_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes of a fan-out's job id set.
    pub fn fail_next_job_id_writes(&self, n: usize) {
        self.job_id_failures.store(n, Ordering::SeqCst);
    }

    pub fn pending_merge_failures(&self) -> usize {
        self.merge_failures.load(Ordering::SeqCst)
    }

    pub fn pending_job_id_failures(&self) -> usize {
        self.job_id_failures.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn unavailable() -> StoreError {
        StoreError::Api {
            status: 503,
            body: "service unavailable".into(),
        }
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn read(&self, batch_id: &str) -> Result<Batch, StoreError> {
        self.inner.read(batch_id).await
    }

    async fn write(
        &self,
        batch_id: &str,
        patch: &BatchPatch,
        expected_version: Option<u64>,
    ) -> Result<Batch, StoreError> {
        let is_job_id_write =
            expected_version.is_none() && patch.status.is_none() && patch.job_ids.is_some();
        if expected_version.is_some() && Self::take(&self.merge_failures) {
            return Err(Self::unavailable());
        }
        if is_job_id_write && Self::take(&self.job_id_failures) {
            return Err(Self::unavailable());
        }
        self.inner.write(batch_id, patch, expected_version).await
    }

    async fn find_by_job_id(&self, job_id: &str) -> Result<Option<Batch>, StoreError> {
        self.inner.find_by_job_id(job_id).await
    }

    async fn list_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>, StoreError> {
        self.inner.list_by_status(status).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(5),
        poll_deadline: Duration::from_secs(3),
        submit_pacing: Duration::from_millis(1),
        max_write_attempts: 5,
        write_retry_delay: Duration::from_millis(1),
        notify_url: Some("http://localhost:3000/api/v1/webhooks/jobs".into()),
    }
}

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<InMemoryRecordStore>,
    /// The store the engine writes through; scripts outages.
    pub faults: Arc<FaultyStore>,
    pub jobs: Arc<FakeJobService>,
}

impl Harness {
    pub fn new(default_behavior: Behavior) -> Self {
        Self::with_config(default_behavior, fast_config())
    }

    pub fn with_config(default_behavior: Behavior, config: EngineConfig) -> Self {
        let store = Arc::new(InMemoryRecordStore::new());
        let faults = Arc::new(FaultyStore::new(store.clone()));
        let jobs = Arc::new(FakeJobService::new(default_behavior));
        let engine = Engine::new(faults.clone(), jobs.clone(), Arc::new(StubAssets), config);
        Self {
            engine,
            store,
            faults,
            jobs,
        }
    }

    /// Seed an idle batch ready to be started.
    pub async fn seed_batch(&self, id: &str, fanout: Option<i64>) {
        let mut batch = Batch::new(id);
        batch.prompt = Some("portrait of a lighthouse keeper".into());
        batch.subject_image_ref = Some("https://files.example.com/subject.png".into());
        batch.size = Some("768x1024".into());
        batch.requested_fanout = fanout;
        self.store.insert(batch).await;
    }

    /// Seed a batch that is already processing the given jobs.
    pub async fn seed_processing(&self, id: &str, jobs: &[&str], seen: &[&str]) {
        let mut batch = Batch::new(id);
        batch.status = BatchStatus::Processing;
        batch.job_ids = jobs.iter().map(|j| j.to_string()).collect();
        batch.seen_ids = seen.iter().map(|j| j.to_string()).collect();
        self.store.insert(batch).await;
    }

    pub async fn read(&self, id: &str) -> Batch {
        self.store.read(id).await.unwrap()
    }

    /// Poll the store until the batch reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: BatchStatus) -> Batch {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let batch = self.read(id).await;
                if batch.status == status {
                    return batch;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("batch did not reach the expected status in time")
    }

    /// Wait until no poller task is running.
    pub async fn wait_for_pollers(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.engine.active_pollers() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pollers did not finish in time");
    }
}

pub fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
