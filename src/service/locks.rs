//! Per-id write serialization.
//!
//! Fetch-then-mutate sequences on the same property id run one at a time
//! within this process. Entries are dropped once no task holds or waits on them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by property id.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: i64) -> KeyedGuard<'_> {
        let mutex = Arc::clone(&self.locks.entry(id).or_default());
        let guard = mutex.lock_owned().await;

        KeyedGuard {
            id,
            registry: &self.locks,
            guard: Some(guard),
        }
    }

    /// Number of ids currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no id is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one id; released on drop.
pub struct KeyedGuard<'a> {
    id: i64,
    registry: &'a DashMap<i64, Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // Release first so our Arc no longer counts
        self.guard.take();
        self.registry
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_is_exclusive_per_id() {
        let locks = Arc::new(KeyedLocks::new());

        let first = locks.lock(1).await;

        // A different id is not blocked
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock(2)).await;
        assert!(other.is_ok());
        drop(other);

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_are_released() {
        let locks = KeyedLocks::new();

        {
            let _a = locks.lock(1).await;
            let _b = locks.lock(2).await;
            assert_eq!(locks.len(), 2);
        }

        assert!(locks.is_empty());
    }
}
