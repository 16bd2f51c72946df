//! Composes an endpoint with the standard middleware chain

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CacheabilityRecord;
use crate::config::EndpointConfig;
use crate::endpoint::{BoxEndpoint, Endpoint};
use crate::error::{AppError, Result};
use crate::middleware::{
    AuthorizationEndpoint, CacheEndpoint, CircuitBreaker, CircuitBreakerEndpoint,
    InstrumentEndpoint, RateLimitEndpoint, RateLimiter, TraceEndpoint,
};
use crate::service::ServiceContext;

/// Builds one endpoint wrapped, outermost first, in: rate limiter, circuit
/// breaker, trace span, instrumentation, cache-aside (cacheable endpoints
/// only), authorization.
pub struct PipelineBuilder {
    context: ServiceContext,
    name: String,
    config: EndpointConfig,
}

impl PipelineBuilder {
    pub fn new(context: ServiceContext, name: impl Into<String>) -> Self {
        let name = name.into();
        let config = context.config().endpoint(&name);

        Self {
            context,
            name,
            config,
        }
    }

    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cacheable(mut self, ttl: std::time::Duration) -> Self {
        self.config.cacheable = true;
        self.config.cache_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn build<Req, Resp, E>(self, operation: E) -> Result<BoxEndpoint<Req, Resp>>
    where
        E: Endpoint<Req, Resp> + 'static,
        Req: Send + 'static,
        Resp: Serialize + DeserializeOwned + Send + 'static,
    {
        self.config
            .validate(&self.name)
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let name = self.name;
        let config = self.config;
        let context = self.context;

        let mut endpoint: BoxEndpoint<Req, Resp> = Arc::new(AuthorizationEndpoint::new(
            name.clone(),
            context.oracle(),
            Arc::new(operation),
        ));

        if config.cacheable {
            match context.cache() {
                Some(cache) => {
                    let record = CacheabilityRecord {
                        endpoint_name: name.clone(),
                        ttl: config.cache_ttl(),
                    };
                    if let Err(e) = cache.register_endpoint(&record).await {
                        warn!(endpoint = %name, error = %e, "failed to register cacheable endpoint");
                    }

                    let resolved = match cache.cacheability(&name).await {
                        Ok(resolved) => resolved,
                        Err(e) => {
                            warn!(endpoint = %name, error = %e, "failed to read cacheability record");
                            None
                        }
                    };

                    endpoint = Arc::new(CacheEndpoint::new(
                        name.clone(),
                        cache.clone(),
                        resolved,
                        context.config().cache.write_timeout(),
                        endpoint,
                    ));
                }
                None => warn!(endpoint = %name, "endpoint is cacheable but no cache store is configured"),
            }
        }

        endpoint = Arc::new(InstrumentEndpoint::new(name.clone(), context.recorder(), endpoint));
        endpoint = Arc::new(TraceEndpoint::new(name.clone(), endpoint));

        let breaker = Arc::new(CircuitBreaker::new(name.clone(), config.circuit_breaker.clone()));
        endpoint = Arc::new(CircuitBreakerEndpoint::new(breaker, endpoint));

        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        endpoint = Arc::new(RateLimitEndpoint::new(limiter, endpoint));

        info!(
            endpoint = %name,
            cacheable = config.cacheable,
            burst = config.rate_limit.burst,
            "endpoint pipeline built"
        );

        Ok(endpoint)
    }
}
