use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutual exclusion.
///
/// Backs the single-writer-per-booking discipline: every transition on a
/// booking, and every check-then-insert on a mentor's calendar, runs
/// under the lock for that key.
pub struct LockRegistry<K> {
    inner: Arc<Mutex<HashMap<K, Arc<Mutex<()>>>>>,
}

impl<K> Clone for LockRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone> LockRegistry<K> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquires the lock for `key`, creating it on first use. The guard
    /// serializes every caller scoped to that key until dropped.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

impl<K: Eq + Hash + Clone> Default for LockRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let registry: LockRegistry<u64> = LockRegistry::new();
        let guard = registry.acquire(1).await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), registry.acquire(1)).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(20), registry.acquire(1)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let registry: LockRegistry<u64> = LockRegistry::new();
        let _guard = registry.acquire(1).await;
        let other = tokio::time::timeout(Duration::from_millis(20), registry.acquire(2)).await;
        assert!(other.is_ok());
    }
}
