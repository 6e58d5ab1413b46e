use fanout_core::error::CoreError;
use fanout_jobs::AssetError;
use fanout_store::StoreError;

/// Errors from applying a job outcome to its batch.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Every attempt lost to a concurrent writer or hit a transient store
    /// failure.
    #[error("Gave up merging job {job_id} into batch {batch_id} after {attempts} attempts")]
    RetriesExhausted {
        batch_id: String,
        job_id: String,
        attempts: u32,
    },
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Subject image could not be prepared: {0}")]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}
