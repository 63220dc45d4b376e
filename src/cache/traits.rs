use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::error::{CacheError, CacheResult};

/// Payload compression applied by the JSON helpers.
///
/// Compressed entries are stored under a `.gz`-suffixed key, so a reader
/// configured without compression never tries to parse gzip bytes as JSON
/// (and vice versa).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    /// Physical key for an entry written with this compression.
    pub fn storage_key(&self, key: &str) -> String {
        match self {
            Compression::None => key.to_string(),
            Compression::Gzip => format!("{key}.gz"),
        }
    }

    fn encode(&self, bytes: Vec<u8>) -> CacheResult<Vec<u8>> {
        match self {
            Compression::None => Ok(bytes),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&bytes)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| CacheError::Serialization(e.to_string()))
            }
        }
    }

    fn decode(&self, bytes: &[u8]) -> CacheResult<Vec<u8>> {
        match self {
            Compression::None => Ok(bytes.to_vec()),
            Compression::Gzip => {
                let mut decoded = Vec::new();
                GzDecoder::new(bytes)
                    .read_to_end(&mut decoded)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                Ok(decoded)
            }
        }
    }
}

/// Byte-level contract every cache backend implements.
///
/// A zero TTL means no expiration, on every backend.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Get raw bytes from cache. `None` for a missing or expired key.
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set raw bytes in cache with TTL.
    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Get raw bytes and remove the entry in one step.
    async fn take_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Delete a value from cache.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Move an entry to a new key, replacing any entry already there.
    /// Fails with [`CacheError::Miss`] when the source key is absent.
    async fn rename(&self, old_key: &str, new_key: &str, ttl: Duration) -> CacheResult<()>;

    /// Subscribe to update notifications for a key.
    /// The receiver gets a unit tick for every `notify_updated` on the key.
    async fn subscribe(&self, key: &str) -> CacheResult<broadcast::Receiver<()>>;

    /// Notify all subscribers that a key changed.
    async fn notify_updated(&self, key: &str) -> CacheResult<()>;
}

// Helper extension trait for working with JSON
pub trait CacheExt: CacheClient {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        compression: Compression,
    ) -> CacheResult<Option<T>> {
        match self.get_bytes(&compression.storage_key(key)).await? {
            Some(bytes) => {
                let raw = compression.decode(&bytes)?;
                let value = serde_json::from_slice(&raw)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        compression: Compression,
    ) -> CacheResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let encoded = compression.encode(bytes)?;
        self.set_bytes(&compression.storage_key(key), &encoded, ttl)
            .await
    }
}

// Blanket implementation for all cache backends
impl<T: CacheClient + ?Sized> CacheExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_suffixes_storage_key() {
        assert_eq!(Compression::None.storage_key("proj/test"), "proj/test");
        assert_eq!(Compression::Gzip.storage_key("proj/test"), "proj/test.gz");
    }

    #[test]
    fn gzip_round_trip() {
        let payload = b"{\"name\":\"test\"}".to_vec();
        let encoded = Compression::Gzip.encode(payload.clone()).unwrap();
        assert_ne!(encoded, payload);

        let decoded = Compression::Gzip.decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn gzip_decode_rejects_plain_bytes() {
        let err = Compression::Gzip.decode(b"not gzip data").unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }

    #[test]
    fn none_is_pass_through() {
        let payload = b"raw".to_vec();
        assert_eq!(Compression::None.encode(payload.clone()).unwrap(), payload);
        assert_eq!(Compression::None.decode(&payload).unwrap(), payload);
    }
}
