//! Per-organization async locks
//!
//! Serializes the read-then-write sequences that decide who becomes an
//! organization's first admin, and duplicate join-request checks. Callers
//! must hold at most one org lock at a time.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Clone, Default)]
pub struct OrgLocks {
    locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl OrgLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_lock(&self, org_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(org_id) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;

        // Another task may have inserted it while we waited
        if let Some(lock) = locks.get(org_id) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(org_id.to_string(), lock.clone());
        lock
    }

    /// Wait for exclusive access to the organization
    pub async fn lock(&self, org_id: &str) -> OwnedMutexGuard<()> {
        self.get_lock(org_id).await.lock_owned().await
    }

    /// Drop locks nobody is holding or waiting on
    pub async fn cleanup(&self) {
        let mut locks = self.locks.write().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Run [`cleanup`](Self::cleanup) on a fixed interval in the background
    pub fn spawn_cleanup(&self, every: Duration) {
        let locks = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                locks.cleanup().await;
            }
        });
    }

    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }
}

impl std::fmt::Debug for OrgLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgLocks").finish_non_exhaustive()
    }
}
