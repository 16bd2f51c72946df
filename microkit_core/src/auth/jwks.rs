//! Remote signing-key retrieval.
//!
//! The verifier asks a [`KeySetFetcher`] for the key set on every token it
//! checks. Caching or retrying the set is left to the fetcher; the HTTP
//! fetcher here does neither, so every verification costs one round trip to
//! the identity provider.

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use std::time::Duration;

use super::AuthError;

#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError>;
}

/// Fetches a JWKS document over HTTP GET.
#[derive(Clone)]
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeyFetchFailed(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError> {
        tracing::debug!("Fetching JWKS from {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch JWKS from {}: {}", url, e);
                AuthError::KeyFetchFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetchFailed(format!(
                "{} returned status {}",
                url,
                response.status().as_u16()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeyFetchFailed(format!("invalid JWKS document: {}", e)))
    }
}

/// Serves one fixed key set regardless of the URL asked for.
#[derive(Clone)]
pub struct StaticKeySet {
    keys: JwkSet,
}

impl StaticKeySet {
    pub fn new(keys: JwkSet) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeySetFetcher for StaticKeySet {
    async fn fetch(&self, _url: &str) -> Result<JwkSet, AuthError> {
        Ok(self.keys.clone())
    }
}
