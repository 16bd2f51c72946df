#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, jwk::JwkSet, Algorithm, EncodingKey, Header};
use microkit_core::cache::CACHEABLE_ENDPOINT_PREFIX;
use microkit_core::config::{AppConfig, EndpointConfig, IdentityConfig};
use microkit_core::{
    AppError, CacheError, CacheStore, EndpointContext, Identity, InMemoryPolicyOracle,
    MemoryCacheStore, Policy, PolicySet, RequestScope, ServiceContext, StaticKeySet, TokenVerifier,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
pub const ROGUE_KEY: &[u8] = include_bytes!("../fixtures/rogue_key.pem");
const SIGNING_KEY_N: &str = "yua6OE22iA2YpnZnQq5B10SJdIs-MO5YA--Ypo3Gkw7LcswwvOsZrEzV1m-caJiIzLivrJacbzdkC_M2svXm7iOSZ0gjbWF09Bv7-jvcgNUS4N_2Tf_43HJuZUMcuapJ3DvLI2yOYRpI4-1gPTN-QpytZnQh5-3SvXEupDYkBDU0fhee5htjRiH_n6T8U8awAK6S24DDDlthhKSImp3284-AqLP4JV4xvhjbik3vicCu4l1hIGZdu1vjzRz5aBtkCB7Zvlhkl5wtQt4f8CKqeQ_0615tMuU5gFanGE7_jUDTU20f8pni8OxoNJf2cu0OilidVw2oOyTWQLBjETJSpQ";

pub const KID: &str = "test-key";

pub fn identity_config() -> IdentityConfig {
    IdentityConfig {
        client_id: "app-123".to_string(),
        scope: "access_as_user".to_string(),
        ..IdentityConfig::default()
    }
}

pub fn key_set() -> JwkSet {
    serde_json::from_value(json!({
        "keys": [{
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": KID,
            "n": SIGNING_KEY_N,
            "e": "AQAB"
        }]
    }))
    .unwrap()
}

pub fn claims(subject: &str) -> Value {
    json!({
        "oid": subject,
        "appid": "app-123",
        "scp": "access_as_user",
        "ver": "2.0",
        "exp": Utc::now().timestamp() + 3600,
    })
}

pub fn token_for(subject: &str, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(
        &header,
        &claims(subject),
        &EncodingKey::from_rsa_pem(SIGNING_KEY).unwrap(),
    )
    .unwrap()
}

pub fn bearer(subject: &str) -> String {
    format!("Bearer {}", token_for(subject, KID))
}

pub fn verifier() -> TokenVerifier {
    TokenVerifier::new(identity_config(), Arc::new(StaticKeySet::new(key_set())))
}

pub async fn oracle(policies: Vec<Policy>) -> Arc<InMemoryPolicyOracle> {
    Arc::new(
        InMemoryPolicyOracle::from_set(PolicySet {
            policies,
            ..PolicySet::default()
        })
        .await
        .unwrap(),
    )
}

pub fn app_config() -> AppConfig {
    AppConfig {
        identity: identity_config(),
        ..AppConfig::default()
    }
}

pub async fn context_with_store(store: Arc<dyn CacheStore>) -> ServiceContext {
    ServiceContext::new(
        app_config(),
        verifier(),
        oracle(vec![Policy::new("u1", "*", "*")]).await,
    )
    .with_cache_store(store)
}

pub fn cacheable_config() -> EndpointConfig {
    EndpointConfig {
        cacheable: true,
        cache_ttl_ms: 60_000,
        ..EndpointConfig::default()
    }
}

pub fn get_scope(subject: &str, path: &str) -> RequestScope {
    RequestScope::new(Identity::new(subject), EndpointContext::new(true, path, false))
}

pub fn no_cache_scope(subject: &str, path: &str) -> RequestScope {
    RequestScope::new(Identity::new(subject), EndpointContext::new(true, path, true))
}

/// Business operation that counts its invocations and echoes the count.
#[derive(Clone, Default)]
pub struct Counter {
    pub calls: Arc<AtomicUsize>,
}

impl Counter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Memory store that counts reads and writes.
pub struct CountingStore {
    pub inner: MemoryCacheStore,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(&AppConfig::default().cache),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }
}

/// Accepts metadata writes but fails every response write.
pub struct FailingStore {
    pub inner: MemoryCacheStore,
    pub response_writes: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(&AppConfig::default().cache),
            response_writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        if ttl.is_none() {
            return self.inner.set(key, value, ttl).await;
        }
        self.response_writes.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Backend("connection reset".to_string()))
    }
}

/// Serves metadata lookups but fails every response read.
pub struct UnreadableStore {
    pub inner: MemoryCacheStore,
}

impl UnreadableStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(&AppConfig::default().cache),
        }
    }
}

#[async_trait]
impl CacheStore for UnreadableStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if key.starts_with(CACHEABLE_ENDPOINT_PREFIX) {
            return self.inner.get(key).await;
        }
        Err(CacheError::Backend("read timed out".to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl).await
    }
}

/// Response writes never finish within any reasonable deadline.
pub struct SlowStore {
    pub inner: MemoryCacheStore,
    pub delay: Duration,
}

#[async_trait]
impl CacheStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        if ttl.is_some() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.set(key, value, ttl).await
    }
}

/// Polls until `key` shows up in `store` or a second has passed.
pub async fn wait_for_key(store: &dyn CacheStore, key: &str) -> Option<Vec<u8>> {
    for _ in 0..100 {
        if let Ok(Some(bytes)) = store.get(key).await {
            return Some(bytes);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

pub fn internal_error() -> AppError {
    AppError::Other(anyhow::anyhow!("downstream unavailable"))
}
