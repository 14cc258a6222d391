use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// A lazily-created mutex per scope id, so concurrent uploads, retention
/// deletes, and indexing on different scopes never block each other, while
/// writes to the same scope are strictly serialized.
///
/// Mirrors the keyed async-mutex-map idiom used elsewhere in this codebase
/// for per-key turn exclusivity: a map from key to a single-permit semaphore,
/// acquired for the duration of the critical section and released on drop.
pub struct ScopeLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ScopeLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for `scope_id`, waiting if another writer currently
    /// holds it. Never fails; the caller holds `OwnedSemaphorePermit` for the
    /// duration of the critical section and drops it to release.
    pub async fn acquire(&self, scope_id: &str) -> OwnedSemaphorePermit {
        let semaphore = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(scope_id.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        semaphore
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    pub async fn scope_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Drops map entries for scopes with no outstanding permits, so the map
    /// does not grow without bound across the process lifetime.
    pub async fn prune_idle(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, sem| sem.available_permits() == 0 || Arc::strong_count(sem) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_access_on_same_scope() {
        let locks = Arc::new(ScopeLockMap::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _permit = locks.acquire("scope-a").await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                assert_eq!(counter.load(Ordering::SeqCst), before + 1);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn different_scopes_run_concurrently() {
        let locks = Arc::new(ScopeLockMap::new());
        let a = locks.acquire("scope-a").await;
        let b = locks.acquire("scope-b").await;
        drop(a);
        drop(b);
        assert_eq!(locks.scope_count().await, 2);
    }

    #[tokio::test]
    async fn same_scope_waits_for_release() {
        let locks = Arc::new(ScopeLockMap::new());
        let permit = locks.acquire("scope-a").await;
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _permit = locks2.acquire("scope-a").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(permit);
        waiter.await.unwrap();
    }
}
