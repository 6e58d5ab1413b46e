//! The engine handle.
//!
//! [`Engine`] owns the job registry, the per-batch locks, the reconciler
//! and the background poller tasks. Create it once at startup and share
//! it behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use fanout_core::batch::Batch;
use fanout_jobs::{AssetEncoder, JobService};
use fanout_store::RecordStore;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::EngineConfig;
use crate::coordinator::{Coordinator, SubmissionSummary};
use crate::error::EngineError;
use crate::events::{BatchEvent, EVENT_CHANNEL_CAPACITY};
use crate::locks::BatchLocks;
use crate::poller::PollerSpawner;
use crate::push::{JobNotification, PushDisposition, PushListener};
use crate::reconciler::Reconciler;
use crate::recovery::{recover_in_flight, RecoverySummary};
use crate::registry::JobRegistry;

pub struct Engine {
    store: Arc<dyn RecordStore>,
    registry: Arc<JobRegistry>,
    coordinator: Coordinator,
    push: PushListener,
    pollers: PollerSpawner,
    event_tx: broadcast::Sender<BatchEvent>,
    /// Master cancellation token; every poller runs under a child of it.
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl Engine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        jobs: Arc<dyn JobService>,
        assets: Arc<dyn AssetEncoder>,
        config: EngineConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        let registry = Arc::new(JobRegistry::new());
        let locks = Arc::new(BatchLocks::new());

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            event_tx.clone(),
            config.write_retry(),
        ));
        let pollers = PollerSpawner::new(
            Arc::clone(&jobs),
            Arc::clone(&reconciler),
            config.poll_interval,
            config.poll_deadline,
            cancel.clone(),
            tasks.clone(),
        );
        let coordinator = Coordinator::new(
            Arc::clone(&store),
            jobs,
            assets,
            Arc::clone(&registry),
            locks,
            pollers.clone(),
            event_tx.clone(),
            config.submit_pacing,
            config.notify_url.clone(),
            config.write_retry(),
        );
        let push = PushListener::new(Arc::clone(&registry), Arc::clone(&store), reconciler);

        Self {
            store,
            registry,
            coordinator,
            push,
            pollers,
            event_tx,
            cancel,
            tasks,
        }
    }

    /// Fan a batch out into jobs. See [`Coordinator::start_batch`].
    pub async fn start_batch(&self, batch_id: &str) -> Result<SubmissionSummary, EngineError> {
        self.coordinator.start_batch(batch_id).await
    }

    /// Apply an inbound job notification. See [`PushListener::handle`].
    pub async fn handle_notification(
        &self,
        notification: &JobNotification,
    ) -> Result<PushDisposition, EngineError> {
        self.push.handle(notification).await
    }

    /// Re-spawn pollers for jobs left in flight by a previous process.
    pub async fn recover_in_flight(&self) -> Result<RecoverySummary, EngineError> {
        recover_in_flight(self.store.as_ref(), &self.registry, &self.pollers).await
    }

    /// Read a batch record.
    pub async fn batch(&self, batch_id: &str) -> Result<Batch, EngineError> {
        Ok(self.store.read(batch_id).await?)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Subscribe to batch lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    /// Number of poller tasks still running.
    pub fn active_pollers(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel all pollers and wait up to `grace` for them to exit.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!(pollers = self.tasks.len(), "Shutting down engine");
        self.cancel.cancel();
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(remaining = self.tasks.len(), "Pollers did not stop in time");
        }
        tracing::info!("Engine shut down complete");
    }
}
