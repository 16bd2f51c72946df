//! Bearer token verification against a federated identity provider

pub mod claims;
pub mod error;
pub mod jwks;
pub mod verifier;


pub use claims::{Identity, TokenClaims, TokenVersion};
pub use error::AuthError;
pub use jwks::{HttpKeySetFetcher, KeySetFetcher, StaticKeySet};
pub use verifier::{extract_bearer_token, TokenVerifier};
