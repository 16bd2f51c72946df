//! Key/value cache stores and the endpoint response cache built on them

pub mod endpoint;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;

pub use endpoint::{CacheabilityRecord, EndpointCache, CACHEABLE_ENDPOINT_PREFIX};
pub use memory::{CacheStats, MemoryCacheStore};
#[cfg(feature = "redis")]
pub use self::redis::RedisCacheStore;
pub use store::{CacheError, CacheStore};
