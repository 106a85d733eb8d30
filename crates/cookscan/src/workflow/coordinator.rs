//! Per-instance serialization of workflow entry.
//!
//! At most one run or resume may touch a given instance at a time;
//! unrelated instances proceed fully in parallel. Locks are created
//! lazily and evicted once the instance reaches a terminal outcome, so
//! the map stays bounded by the number of in-flight instances.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ResumeCoordinator {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResumeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the instance. Concurrent callers are
    /// linearized, never rejected.
    pub async fn acquire(&self, instance_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            // A poisoned map is still structurally sound; keep going.
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                locks
                    .entry(instance_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Drops the instance's lock entry after a terminal outcome. A holder
    /// of an outstanding guard keeps the inner mutex alive via its `Arc`.
    pub fn evict(&self, instance_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(instance_id);
    }

    pub fn tracked_instances(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_instance_is_linearized() {
        let coordinator = Arc::new(ResumeCoordinator::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let _guard = coordinator.acquire("rec-1").await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_instances_run_in_parallel() {
        let coordinator = Arc::new(ResumeCoordinator::new());

        let a = coordinator.acquire("rec-a").await;
        // Must not deadlock: a different instance is unaffected by rec-a.
        let b = tokio::time::timeout(Duration::from_millis(100), coordinator.acquire("rec-b"))
            .await
            .expect("unrelated instance was blocked");
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn test_evict_bounds_the_map() {
        let coordinator = ResumeCoordinator::new();
        {
            let _guard = coordinator.acquire("rec-1").await;
        }
        {
            let _guard = coordinator.acquire("rec-2").await;
        }
        assert_eq!(coordinator.tracked_instances(), 2);

        coordinator.evict("rec-1");
        coordinator.evict("rec-2");
        assert_eq!(coordinator.tracked_instances(), 0);
    }
}
