//! Shared collaborators every endpoint pipeline is built from

use std::sync::Arc;
use tracing::info;

use crate::auth::TokenVerifier;
use crate::cache::{CacheStore, EndpointCache, MemoryCacheStore};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::metrics::{LatencyRecorder, MetricsCollector};
use crate::pipeline::PipelineBuilder;
use crate::policy::{InMemoryPolicyOracle, PolicyOracle, PolicySource};

/// Composition root handed to pipeline builders and HTTP middleware.
///
/// Cloning is cheap; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct ServiceContext {
    config: Arc<AppConfig>,
    verifier: Arc<TokenVerifier>,
    oracle: Arc<dyn PolicyOracle>,
    cache: Option<EndpointCache>,
    metrics: MetricsCollector,
    recorder: Arc<dyn LatencyRecorder>,
}

impl ServiceContext {
    pub fn new(config: AppConfig, verifier: TokenVerifier, oracle: Arc<dyn PolicyOracle>) -> Self {
        let metrics = MetricsCollector::new();

        Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            oracle,
            cache: None,
            recorder: Arc::new(metrics.clone()),
            metrics,
        }
    }

    /// Wires the stock collaborators: HTTP key fetching, an in-memory oracle
    /// loaded from `policies`, and the cache backend the config selects.
    pub async fn from_config(config: AppConfig, policies: Arc<dyn PolicySource>) -> Result<Self> {
        let verifier = TokenVerifier::from_config(config.identity.clone())
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let oracle = InMemoryPolicyOracle::load(policies)
            .await
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let store = if config.cache.enabled {
            Some(Self::cache_store(&config).await?)
        } else {
            None
        };

        let mut context = Self::new(config, verifier, Arc::new(oracle));
        if let Some(store) = store {
            context = context.with_cache_store(store);
        }

        Ok(context)
    }

    #[cfg(feature = "redis")]
    async fn cache_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>> {
        if let Some(url) = &config.cache.redis_url {
            let store = crate::cache::RedisCacheStore::connect(url)
                .await
                .map_err(|e| AppError::Configuration(e.to_string()))?;
            return Ok(Arc::new(store));
        }

        info!("using in-memory cache store");
        Ok(Arc::new(MemoryCacheStore::new(&config.cache)))
    }

    #[cfg(not(feature = "redis"))]
    async fn cache_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>> {
        if config.cache.redis_url.is_some() {
            tracing::warn!("redis_url is set but the redis feature is disabled");
        }

        info!("using in-memory cache store");
        Ok(Arc::new(MemoryCacheStore::new(&config.cache)))
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(EndpointCache::new(store));
        self
    }

    pub fn with_latency_recorder(mut self, recorder: Arc<dyn LatencyRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn oracle(&self) -> Arc<dyn PolicyOracle> {
        self.oracle.clone()
    }

    pub fn cache(&self) -> Option<&EndpointCache> {
        self.cache.as_ref()
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn recorder(&self) -> Arc<dyn LatencyRecorder> {
        self.recorder.clone()
    }

    /// Starts a pipeline for `name` using that endpoint's configured settings.
    pub fn pipeline(&self, name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(self.clone(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Policy, PolicySet, StaticPolicySource};

    fn policies() -> Arc<dyn PolicySource> {
        Arc::new(StaticPolicySource::new(PolicySet {
            policies: vec![Policy::new("u1", "get-app-data", "*")],
            ..PolicySet::default()
        }))
    }

    #[tokio::test]
    async fn test_from_config() {
        let context = ServiceContext::from_config(AppConfig::default(), policies())
            .await
            .unwrap();
        assert!(context.cache().is_some());
        assert!(context
            .oracle()
            .enforce("u1", "get-app-data", "*")
            .await
            .unwrap());

        let mut config = AppConfig::default();
        config.cache.enabled = false;
        let context = ServiceContext::from_config(config, policies()).await.unwrap();
        assert!(context.cache().is_none());
    }

    #[tokio::test]
    async fn test_custom_recorder() {
        struct Nothing;
        impl LatencyRecorder for Nothing {
            fn observe(&self, _: &str, _: bool, _: std::time::Duration) {}
        }

        let context = ServiceContext::from_config(AppConfig::default(), policies())
            .await
            .unwrap()
            .with_latency_recorder(Arc::new(Nothing));
        context
            .recorder()
            .observe("get-app-data", true, std::time::Duration::from_millis(1));
        assert_eq!(context.metrics().get_snapshot().total_calls, 0);
    }
}
