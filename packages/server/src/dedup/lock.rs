use std::sync::Arc;

use common::storage::StorageLocation;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-location async locks.
///
/// Writing new bytes and purging old ones both hold the lock for their
/// location, so a purge that runs after its commit can never remove a file a
/// newer blob row already points at.
#[derive(Debug, Default, Clone)]
pub struct LocationLocks {
    inner: Arc<DashMap<StorageLocation, Arc<Mutex<()>>>>,
}

/// Held while a location is being written or purged. Dropping it releases
/// the lock and forgets the entry once nobody else waits on it.
pub struct LocationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    location: StorageLocation,
    locks: LocationLocks,
}

impl LocationLocks {
    pub async fn lock(&self, location: &StorageLocation) -> LocationGuard {
        let mutex = self
            .inner
            .entry(location.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        LocationGuard {
            guard: Some(guard),
            location: location.clone(),
            locks: self.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for LocationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one handle; any other holder is a waiter.
        self.locks
            .inner
            .remove_if(&self.location, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
