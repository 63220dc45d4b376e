use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;

use super::{
    error::{CacheError, CacheResult},
    traits::CacheClient,
};
use crate::config::MemoryCacheConfig;

/// Buffered update notifications per key before lagging receivers drop ticks.
const NOTIFY_CAPACITY: usize = 16;

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, expires_at: Option<Instant>) -> Self {
        Self {
            data,
            expires_at,
            last_accessed: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// In-memory cache implementation using DashMap for concurrent access.
///
/// # Multi-Node Deployments
///
/// **WARNING**: This cache is NOT suitable for multi-node deployments.
///
/// Each replica maintains its own independent cache and notification
/// channels. Update notifications only reach subscribers on the local
/// replica, and invalidation never propagates to peers.
///
/// For multi-node deployments, use the Redis cache which provides shared
/// state and cross-replica notification fan-out.
pub struct MemoryCache {
    data: DashMap<String, CacheEntry>,
    channels: DashMap<String, broadcast::Sender<()>>,
    max_entries: usize,
    eviction_batch_size: usize,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        Self {
            data: DashMap::new(),
            channels: DashMap::new(),
            max_entries: config.max_entries,
            eviction_batch_size: config.eviction_batch_size.max(1),
        }
    }

    fn sender(&self, key: &str) -> broadcast::Sender<()> {
        self.channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(NOTIFY_CAPACITY).0)
            .clone()
    }

    fn expires_at(ttl: Duration) -> Option<Instant> {
        if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        }
    }

    fn evict_if_needed(&self) {
        if self.data.len() < self.max_entries {
            return;
        }

        // First pass: remove all expired entries
        self.data.retain(|_, entry| !entry.is_expired());

        // If still at or above capacity, evict least recently used entries
        let current_len = self.data.len();
        if current_len < self.max_entries {
            return;
        }

        // Calculate how many entries to evict
        let target_size = self.max_entries.saturating_sub(self.eviction_batch_size);
        let to_evict = current_len.saturating_sub(target_size);

        if to_evict == 0 {
            return;
        }

        // Collect entries sorted by last_accessed (oldest first)
        let mut entries: Vec<_> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.last_accessed))
            .collect();
        entries.sort_by_key(|(_, last_accessed)| *last_accessed);

        // Remove the oldest entries
        for (key, _) in entries.into_iter().take(to_evict) {
            self.data.remove(&key);
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if let Some(mut entry) = self.data.get_mut(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove(key);
                return Ok(None);
            }

            // Update last accessed time for LRU tracking
            entry.touch();
            Ok(Some(entry.data.clone()))
        } else {
            Ok(None)
        }
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.evict_if_needed();

        self.data.insert(
            key.to_string(),
            CacheEntry::new(value.to_vec(), Self::expires_at(ttl)),
        );

        Ok(())
    }

    async fn take_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.data.remove(key) {
            Some((_, entry)) if !entry.is_expired() => Ok(Some(entry.data)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn rename(&self, old_key: &str, new_key: &str, ttl: Duration) -> CacheResult<()> {
        match self.data.remove(old_key) {
            Some((_, entry)) if !entry.is_expired() => {
                self.data.insert(
                    new_key.to_string(),
                    CacheEntry::new(entry.data, Self::expires_at(ttl)),
                );
                Ok(())
            }
            _ => Err(CacheError::Miss),
        }
    }

    async fn subscribe(&self, key: &str) -> CacheResult<broadcast::Receiver<()>> {
        Ok(self.sender(key).subscribe())
    }

    async fn notify_updated(&self, key: &str) -> CacheResult<()> {
        // A send error only means nobody is subscribed right now
        let _ = self.sender(key).send(());
        Ok(())
    }
}
