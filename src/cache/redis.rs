use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    error::{CacheError, CacheResult},
    traits::CacheClient,
};
use crate::config::RedisCacheConfig;

/// Buffered update notifications per key before lagging receivers drop ticks.
const NOTIFY_CAPACITY: usize = 16;

/// Redis-backed cache for multi-replica deployments.
///
/// Keys are namespaced with the configured prefix. Update notifications ride
/// Redis pub/sub: the first subscriber for a key opens a dedicated pub/sub
/// connection whose messages are forwarded into a local broadcast channel, so
/// any number of in-process receivers share one upstream subscription.
pub struct RedisCache {
    client: redis::Client,
    connect_timeout: Duration,
    key_prefix: String,
    channels: Arc<DashMap<String, broadcast::Sender<()>>>,
}

impl RedisCache {
    pub fn from_config(config: &RedisCacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            key_prefix: config.key_prefix.clone(),
            channels: Arc::new(DashMap::new()),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> CacheResult<MultiplexedConnection> {
        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                self.connect_timeout,
                self.connect_timeout,
            )
            .await?;
        Ok(conn)
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let full_key = self.prefixed_key(key);

        let data: Option<Vec<u8>> = redis::cmd("GET")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;

        Ok(data)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let full_key = self.prefixed_key(key);

        if ttl.is_zero() {
            let _: () = redis::cmd("SET")
                .arg(&full_key)
                .arg(value)
                .query_async(&mut conn)
                .await?;
        } else {
            let _: () = redis::cmd("SET")
                .arg(&full_key)
                .arg(value)
                .arg("PX")
                .arg(ttl.as_millis() as u64)
                .query_async(&mut conn)
                .await?;
        }

        Ok(())
    }

    async fn take_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let full_key = self.prefixed_key(key);

        // GETDEL requires Redis 6.2+
        let data: Option<Vec<u8>> = redis::cmd("GETDEL")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;

        Ok(data)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let full_key = self.prefixed_key(key);

        let _: () = redis::cmd("DEL")
            .arg(&full_key)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn rename(&self, old_key: &str, new_key: &str, _ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection().await?;

        // RENAME carries the source TTL over, so the ttl parameter is unused here
        let renamed: Result<(), redis::RedisError> = redis::cmd("RENAME")
            .arg(self.prefixed_key(old_key))
            .arg(self.prefixed_key(new_key))
            .query_async(&mut conn)
            .await;

        match renamed {
            Ok(()) => Ok(()),
            // Redis answers "no such key" when the source is absent
            Err(e) if e.to_string().contains("no such key") => Err(CacheError::Miss),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(&self, key: &str) -> CacheResult<broadcast::Receiver<()>> {
        let channel = self.prefixed_key(key);

        // Reuse the upstream subscription when one is already running
        if let Some(sender) = self.channels.get(&channel) {
            return Ok(sender.subscribe());
        }

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let sender = self
            .channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(NOTIFY_CAPACITY).0)
            .clone();
        let receiver = sender.subscribe();

        // Two racing first-subscribers can each open an upstream connection;
        // both feed the same sender, duplicating ticks at worst.
        let channels = Arc::clone(&self.channels);
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while messages.next().await.is_some() {
                if sender.send(()).is_err() {
                    // All receivers dropped; tear down the upstream subscription
                    break;
                }
            }
            channels.remove(&channel);
            debug!(channel = %channel, "cache update subscription closed");
        });

        Ok(receiver)
    }

    async fn notify_updated(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;

        let _: () = redis::cmd("PUBLISH")
            .arg(self.prefixed_key(key))
            .arg("")
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::Compression;

    fn test_config(url: &str) -> RedisCacheConfig {
        RedisCacheConfig {
            url: url.to_string(),
            connect_timeout_secs: 5,
            key_prefix: "bosun:".to_string(),
            compression: Compression::None,
        }
    }

    #[test]
    fn test_prefixed_key() {
        let cache = RedisCache::from_config(&test_config("redis://localhost:6379/0")).unwrap();
        assert_eq!(cache.prefixed_key("project:test"), "bosun:project:test");
    }

    #[test]
    fn test_rejects_malformed_url() {
        let result = RedisCache::from_config(&test_config("http://localhost:6379"));
        assert!(result.is_err(), "non-redis URL scheme must be rejected");
    }
}
