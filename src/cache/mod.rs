mod error;
mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod traits;

// Public API exports
pub use error::{CacheError, CacheResult};
pub use keys::CacheKeys;
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis::RedisCache;
pub use traits::{CacheClient, CacheExt, Compression};
