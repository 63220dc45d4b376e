//! Keyed async mutex registry.
//!
//! Mutations against the same project must not interleave between the
//! read-validate-persist steps. [`KeyLock`] hands out one mutex per key,
//! created lazily on first use.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the mutex for `key`, waiting if another holder has it.
    ///
    /// Guards for distinct keys never contend. The guard releases on drop,
    /// covering every exit path of the critical section.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
