use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::store::{CacheError, CacheStore};

/// Metadata keys are `cacheable-endpoint-ttl:<endpoint name>`.
pub const CACHEABLE_ENDPOINT_PREFIX: &str = "cacheable-endpoint-ttl:";

/// Marks an endpoint as cacheable and carries the ttl its responses get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheabilityRecord {
    pub endpoint_name: String,
    pub ttl: Duration,
}

/// Endpoint-aware view over a [`CacheStore`]: cacheability metadata plus
/// JSON-encoded responses namespaced by endpoint name.
#[derive(Clone)]
pub struct EndpointCache {
    store: Arc<dyn CacheStore>,
}

impl EndpointCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn metadata_key(endpoint_name: &str) -> String {
        format!("{}{}", CACHEABLE_ENDPOINT_PREFIX, endpoint_name)
    }

    pub fn response_key(endpoint_name: &str, request_key: &str) -> String {
        format!("{}:{}", endpoint_name, request_key)
    }

    /// Writes the cacheability record. The entry never expires; the ttl is
    /// stored as a JSON integer of nanoseconds.
    pub async fn register_endpoint(&self, record: &CacheabilityRecord) -> Result<(), CacheError> {
        let nanos = u64::try_from(record.ttl.as_nanos()).unwrap_or(u64::MAX);
        let value = serde_json::to_vec(&nanos).map_err(CacheError::Encode)?;

        self.store
            .set(&Self::metadata_key(&record.endpoint_name), value, None)
            .await?;

        debug!(
            endpoint = %record.endpoint_name,
            ttl_ms = record.ttl.as_millis() as u64,
            "registered cacheable endpoint"
        );
        Ok(())
    }

    pub async fn cacheability(
        &self,
        endpoint_name: &str,
    ) -> Result<Option<CacheabilityRecord>, CacheError> {
        let key = Self::metadata_key(endpoint_name);
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let nanos: u64 = serde_json::from_slice(&bytes)
            .map_err(|source| CacheError::Decode { key, source })?;

        Ok(Some(CacheabilityRecord {
            endpoint_name: endpoint_name.to_string(),
            ttl: Duration::from_nanos(nanos),
        }))
    }

    pub async fn get_response<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        match self.store.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| CacheError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn encode_response<T>(value: &T) -> Result<Vec<u8>, CacheError>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value).map_err(CacheError::Encode)
    }

    pub async fn put_encoded(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.store.set(key, bytes, Some(ttl)).await
    }

    pub async fn put_response<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = Self::encode_response(value)?;
        self.put_encoded(key, bytes, ttl).await
    }
}
