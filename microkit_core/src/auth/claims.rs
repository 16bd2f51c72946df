use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AuthError;

/// The verified caller of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Token format versions issued by the identity platform. Each one
/// publishes its signing keys at a different discovery URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenVersion {
    V1,
    V2,
}

impl std::str::FromStr for TokenVersion {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" => Ok(TokenVersion::V1),
            "2.0" => Ok(TokenVersion::V2),
            other => Err(AuthError::UnsupportedTokenVersion(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionClaim {
    ver: Option<String>,
}

/// The JOSE header fields the verifier needs before it has a key.
#[derive(Debug, Clone, Deserialize)]
pub struct UnverifiedHeader {
    pub alg: String,
    pub kid: Option<String>,
}

fn decode_segment<T: serde::de::DeserializeOwned>(
    token: &str,
    index: usize,
    name: &str,
) -> Result<T, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(segments[index].trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("{} is not base64url: {}", name, e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("{} has an unexpected shape: {}", name, e)))
}

/// Decodes the header without verifying anything.
pub fn peek_header(token: &str) -> Result<UnverifiedHeader, AuthError> {
    decode_segment(token, 0, "header")
}

/// Reads the `ver` claim from a token without verifying it. Only used to pick
/// the key discovery endpoint before the signature is checked.
pub fn peek_token_version(token: &str) -> Result<TokenVersion, AuthError> {
    let claim: VersionClaim = decode_segment(token, 1, "payload")?;

    match claim.ver {
        Some(ver) => ver.parse(),
        None => Err(AuthError::UnsupportedTokenVersion("<missing>".to_string())),
    }
}

/// Claim set of a token whose signature has been verified.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    claims: Map<String, Value>,
}

impl TokenClaims {
    /// Returns a string claim, failing with a typed error when it is absent
    /// or of another JSON type.
    pub fn string_claim(&self, name: &str) -> Result<&str, AuthError> {
        match self.claims.get(name) {
            Some(Value::String(value)) => Ok(value.as_str()),
            _ => Err(AuthError::MissingClaim(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"k1"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_peek_token_version() {
        assert_eq!(
            peek_token_version(&token_with_payload(r#"{"ver":"1.0"}"#)).unwrap(),
            TokenVersion::V1
        );
        assert_eq!(
            peek_token_version(&token_with_payload(r#"{"ver":"2.0","oid":"u1"}"#)).unwrap(),
            TokenVersion::V2
        );
        assert_eq!(
            peek_token_version(&token_with_payload(r#"{"ver":"3.0"}"#)),
            Err(AuthError::UnsupportedTokenVersion("3.0".to_string()))
        );
        assert!(matches!(
            peek_token_version(&token_with_payload(r#"{"oid":"u1"}"#)),
            Err(AuthError::UnsupportedTokenVersion(_))
        ));
    }

    #[test]
    fn test_peek_rejects_garbage() {
        assert!(matches!(
            peek_token_version("no-dots-here"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            peek_token_version("a.!!!.c"),
            Err(AuthError::MalformedToken(_))
        ));
        // a numeric ver is a schema violation, not a panic
        assert!(matches!(
            peek_token_version(&token_with_payload(r#"{"ver":2}"#)),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_peek_header() {
        let header = peek_header(&token_with_payload(r#"{"ver":"1.0"}"#)).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("k1"));

        let token = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"ver":"1.0"}"#)
        );
        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, "none");
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_string_claim() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"oid":"user-1","exp":12,"scp":"read"}"#).unwrap();
        assert_eq!(claims.string_claim("oid").unwrap(), "user-1");
        assert_eq!(
            claims.string_claim("exp"),
            Err(AuthError::MissingClaim("exp".to_string()))
        );
        assert_eq!(
            claims.string_claim("appid"),
            Err(AuthError::MissingClaim("appid".to_string()))
        );
    }
}
