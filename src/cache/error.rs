use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested key (or the source key of a rename) is absent.
    /// Callers routinely match on this; it is not a transport failure.
    #[error("cache: key is missing")]
    Miss,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
