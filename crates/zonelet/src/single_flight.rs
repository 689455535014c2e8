//! Per-workload critical sections.
//!
//! At most one holder per id at a time. Holders of different ids never wait
//! on each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::workload::WorkloadId;

/// Held for the duration of a critical section; dropping it releases the id.
pub type FlightGuard = OwnedMutexGuard<()>;

/// Locks are never removed: ids are never released by the registry either.
/// Prune here once workloads can be stopped and their ids reused.
#[derive(Default)]
pub struct SingleFlight {
    locks: DashMap<WorkloadId, Arc<Mutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds `id`, then holds it.
    pub async fn acquire(&self, id: &WorkloadId) -> FlightGuard {
        // Clone the lock out so the shard guard is released before awaiting.
        let lock = self.locks.entry(id.clone()).or_default().value().clone();
        lock.lock_owned().await
    }

    /// Whether `id` is currently held.
    pub fn is_held(&self, id: &WorkloadId) -> bool {
        self.locks
            .get(id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}
