//! Process-local job id -> batch id map.
//!
//! Populated at submission (and by recovery / push fallback lookups).
//! Entries are never removed; a miss is not an error because the poller
//! owns completion for every job independently of this map.

use std::collections::HashMap;

use fanout_core::types::{BatchId, JobId};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct JobRegistry {
    owners: RwLock<HashMap<JobId, BatchId>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `job_id` as belonging to `batch_id`.
    pub async fn register(&self, job_id: impl Into<JobId>, batch_id: impl Into<BatchId>) {
        self.owners
            .write()
            .await
            .insert(job_id.into(), batch_id.into());
    }

    /// The owning batch of `job_id`, if this process knows it.
    pub async fn lookup(&self, job_id: &str) -> Option<BatchId> {
        self.owners.read().await.get(job_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.owners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.owners.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_lookup() {
        let registry = JobRegistry::new();
        registry.register("job-1", "rec1").await;

        assert_eq!(registry.lookup("job-1").await.as_deref(), Some("rec1"));
        assert!(registry.lookup("job-2").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn re_registering_moves_ownership() {
        let registry = JobRegistry::new();
        registry.register("job-1", "rec1").await;
        registry.register("job-1", "rec2").await;

        assert_eq!(registry.lookup("job-1").await.as_deref(), Some("rec2"));
        assert_eq!(registry.len().await, 1);
    }
}
