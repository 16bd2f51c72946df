use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;

use super::claims::{peek_header, peek_token_version, Identity, TokenClaims, TokenVersion};
use super::jwks::{HttpKeySetFetcher, KeySetFetcher};
use super::AuthError;
use crate::config::{IdentityConfig, ScopeMatch};

const BEARER_PREFIX: &str = "Bearer ";

/// Verifies bearer tokens issued by a federated identity provider whose
/// signing keys rotate and are published as a JWKS document.
#[derive(Clone)]
pub struct TokenVerifier {
    fetcher: Arc<dyn KeySetFetcher>,
    config: IdentityConfig,
}

impl TokenVerifier {
    pub fn new(config: IdentityConfig, fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self { fetcher, config }
    }

    /// Builds a verifier that fetches keys over HTTP.
    pub fn from_config(config: IdentityConfig) -> Result<Self, AuthError> {
        let fetcher = HttpKeySetFetcher::new(config.key_fetch_timeout())?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn keys_url(&self, version: TokenVersion) -> &str {
        match version {
            TokenVersion::V1 => &self.config.v1_keys_url,
            TokenVersion::V2 => &self.config.v2_keys_url,
        }
    }

    pub async fn verify(&self, header_value: Option<&str>) -> Result<Identity, AuthError> {
        let token = extract_bearer_token(header_value)?;

        let header = peek_header(token)?;
        let algorithm = rsa_algorithm(&header.alg)?;
        let version = peek_token_version(token)?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let key_set = self.fetcher.fetch(self.keys_url(version)).await?;
        let jwk = key_set
            .find(&kid)
            .ok_or_else(|| AuthError::KeyIdNotFound(kid.clone()))?;
        let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| {
            AuthError::KeyFetchFailed(format!("key {} is not a usable public key: {}", kid, e))
        })?;

        let mut validation = Validation::new(algorithm);
        // audience is checked below against the configured client id claim
        validation.validate_aud = false;

        let claims = decode::<TokenClaims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::SignatureInvalid(e.to_string()))?;

        self.check_audience(&claims)?;

        let subject = claims.string_claim(&self.config.subject_claim)?;
        tracing::debug!(subject = %subject, kid = %kid, "bearer token verified");

        Ok(Identity::new(subject))
    }

    fn check_audience(&self, claims: &TokenClaims) -> Result<(), AuthError> {
        let client_id = claims
            .string_claim(&self.config.client_id_claim)
            .map_err(|_| AuthError::InvalidAudience)?;
        if self.config.client_id.is_empty() || client_id != self.config.client_id {
            return Err(AuthError::InvalidAudience);
        }

        let scopes = claims
            .string_claim(&self.config.scope_claim)
            .map_err(|_| AuthError::InvalidAudience)?;
        let scope_ok = match self.config.scope_match {
            ScopeMatch::Exact => scopes == self.config.scope,
            ScopeMatch::Contains => scopes.split_whitespace().any(|scope| scope == self.config.scope),
        };
        if !scope_ok {
            return Err(AuthError::InvalidAudience);
        }

        Ok(())
    }
}

pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = match header_value {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingHeader),
    };

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedHeader)?;

    if token.is_empty() || token.contains(BEARER_PREFIX) {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

fn rsa_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    match alg.parse::<Algorithm>() {
        Ok(
            algorithm @ (Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512),
        ) => Ok(algorithm),
        _ => Err(AuthError::UnsupportedSigningAlgorithm(alg.to_string())),
    }
}
