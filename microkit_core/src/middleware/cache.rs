use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn, Instrument};

use crate::cache::{CacheError, CacheabilityRecord, EndpointCache};
use crate::endpoint::{BoxEndpoint, Endpoint, RequestScope};
use crate::error::AppError;

/// Cache-aside layer. Hits short-circuit the wrapped endpoint; successful
/// misses are written back from a spawned task the request never waits on.
/// Concurrent misses for the same key each invoke the endpoint.
pub struct CacheEndpoint<Req, Resp> {
    name: String,
    cache: EndpointCache,
    record: Option<CacheabilityRecord>,
    write_timeout: Duration,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> CacheEndpoint<Req, Resp> {
    /// `record` is the cacheability record resolved for `name` when the
    /// pipeline was built. Without one the layer passes every call through.
    pub fn new(
        name: impl Into<String>,
        cache: EndpointCache,
        record: Option<CacheabilityRecord>,
        write_timeout: Duration,
        inner: BoxEndpoint<Req, Resp>,
    ) -> Self {
        Self {
            name: name.into(),
            cache,
            record,
            write_timeout,
            inner,
        }
    }
}

impl<Req, Resp> CacheEndpoint<Req, Resp>
where
    Resp: Serialize,
{
    fn schedule_write(&self, key: String, response: &Resp, ttl: Duration) {
        let bytes = match EndpointCache::encode_response(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "response is not cacheable");
                return;
            }
        };

        let cache = self.cache.clone();
        let write_timeout = self.write_timeout;

        tokio::spawn(
            async move {
                let write = cache.put_encoded(&key, bytes, ttl);
                match tokio::time::timeout(write_timeout, write).await {
                    Ok(Ok(())) => debug!(key = %key, "cached endpoint response"),
                    Ok(Err(e)) => warn!(key = %key, error = %e, "failed to cache endpoint response"),
                    Err(_) => warn!(error = %CacheError::Timeout(key), "failed to cache endpoint response"),
                }
            }
            .in_current_span(),
        );
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for CacheEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Serialize + DeserializeOwned + Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        let Some(record) = &self.record else {
            debug!(endpoint = %self.name, "endpoint not registered as cacheable");
            return self.inner.call(scope, request).await;
        };

        if !scope.endpoint.cacheable {
            debug!(endpoint = %self.name, data_from_cache = false, "request is not cacheable");
            return self.inner.call(scope, request).await;
        }

        let key = EndpointCache::response_key(&self.name, &scope.endpoint.key);

        if !scope.endpoint.bypass_cache {
            match self.cache.get_response::<Resp>(&key).await {
                Ok(Some(response)) => {
                    debug!(key = %key, data_from_cache = true, "cache hit");
                    return Ok(response);
                }
                Ok(None) => debug!(key = %key, "cache miss"),
                Err(e) => warn!(key = %key, error = %e, "cache read failed, calling endpoint"),
            }
        }

        let ttl = record.ttl;
        let response = self.inner.call(scope, request).await?;
        self.schedule_write(key, &response, ttl);

        debug!(endpoint = %self.name, data_from_cache = false, "served from endpoint");
        Ok(response)
    }
}
