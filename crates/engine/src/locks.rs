//! Per-batch async mutexes.
//!
//! Every read-modify-write of a batch record in this process happens
//! under the batch's lock, so concurrent outcomes for sibling jobs (or a
//! duplicate push racing a poller) are applied one at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct BatchLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `batch_id`.
    ///
    /// Entries nobody holds or waits on are pruned on each call.
    pub async fn acquire(&self, batch_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(batch_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of batches with a live lock entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
