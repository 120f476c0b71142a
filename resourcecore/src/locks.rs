//! Per-resource exclusive sections.

use parking_lot::Mutex;
use resourcecore_types::ResourceId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of one async mutex per resource id.
///
/// Entries are created on first use and removed when the last holder or
/// waiter lets go, including waiters cancelled before they acquire the lock.
/// The table therefore only holds ids with a holder or a pending waiter. Its
/// own lock is never held across an await.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    locks: Mutex<HashMap<ResourceId, Arc<AsyncMutex<()>>>>,
}

/// A claim on one table entry, held by holders and waiters alike.
#[derive(Debug)]
struct Registration<'a> {
    table: &'a LockTable,
    id: ResourceId,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut locks = self.table.locks.lock();
        // One reference in the table, one in this registration
        let unused = locks
            .get(&self.id)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) <= 2);
        if unused {
            let _ = locks.remove(&self.id);
        }
    }
}

/// Exclusive access to one resource id until dropped.
#[derive(Debug)]
pub(crate) struct ResourceGuard<'a> {
    // Released before the registration so its reference is gone when the
    // registration checks for other users
    _held: OwnedMutexGuard<()>,
    _registration: Registration<'a>,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    ///
    /// Dropping the returned future before it completes releases its claim
    /// on the table entry.
    pub(crate) async fn lock(&self, id: &ResourceId) -> ResourceGuard<'_> {
        let registration = {
            let mut locks = self.locks.lock();
            Registration {
                table: self,
                id: id.clone(),
                lock: Arc::clone(locks.entry(id.clone()).or_default()),
            }
        };

        let acquire = Arc::clone(&registration.lock);
        let held = acquire.lock_owned().await;

        ResourceGuard {
            _held: held,
            _registration: registration,
        }
    }

    /// Number of ids with a live entry.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
