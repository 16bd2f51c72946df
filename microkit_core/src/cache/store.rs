use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("failed to encode cache value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode cache value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache write for {0} exceeded its deadline")]
    Timeout(String),
}

/// Byte-oriented key/value store with optional per-entry expiry.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key`. `ttl == None` means the entry never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;
}
