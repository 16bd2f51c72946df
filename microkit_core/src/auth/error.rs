use thiserror::Error;

/// Every way a bearer token can be rejected. Each kind stays distinct so
/// callers and logs can tell them apart, while all of them render as 401.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("ERR-001:authorization header is empty")]
    MissingHeader,

    #[error("ERR-002:malformed authorization header")]
    MalformedHeader,

    #[error("ERR-002:malformed token: {0}")]
    MalformedToken(String),

    #[error("ERR-006:unsupported signing algorithm: {0}")]
    UnsupportedSigningAlgorithm(String),

    #[error("ERR-003:kid header not found")]
    MissingKeyId,

    #[error("ERR-003:jwk key {0} not found")]
    KeyIdNotFound(String),

    #[error("ERR-004:could not fetch signing keys: {0}")]
    KeyFetchFailed(String),

    #[error("ERR-006:invalid JWT token: {0}")]
    SignatureInvalid(String),

    #[error("ERR-005:unexpected token version: {0}")]
    UnsupportedTokenVersion(String),

    #[error("ERR-103:invalid JWT token: client id or scope mismatch")]
    InvalidAudience,

    #[error("ERR-006:invalid JWT token: missing claim {0}")]
    MissingClaim(String),
}
