use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy source unavailable: {0}")]
    Source(String),

    #[error("invalid policy pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },
}

/// One `(subject, object, action)` rule. Any field may be `*`, and the
/// subject may name a role as `role_<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    pub subject: String,
    pub object: String,
    pub action: String,
}

impl Policy {
    pub fn new(subject: impl Into<String>, object: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
        }
    }
}

/// Grants `role` to `subject`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub subject: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
    /// Roles every authenticated subject holds implicitly.
    #[serde(default)]
    pub default_roles: Vec<String>,
}

/// External decision engine consulted on every request.
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError>;
}

/// Where an oracle bulk-loads its rules from.
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn load(&self) -> Result<PolicySet, PolicyError>;
}
