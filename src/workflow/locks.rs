use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Async mutexes keyed by entity id.
///
/// Every read-then-write on an order (offer decisions, status transitions,
/// tracking appends, charges) or on a ledger entry runs while holding the
/// guard for that id, so two requests racing on the same entity serialize
/// while unrelated entities proceed in parallel.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. The lock is released when the
    /// returned guard is dropped.
    pub async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
        // Clone the mutex out so the shard lock is not held across the await.
        let mutex = self.inner.entry(key).or_default().clone();
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
