use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use super::matcher::{KeyMatcher, PolicyMatcher};
use super::oracle::{Policy, PolicyError, PolicyOracle, PolicySet, PolicySource};

const ROLE_PREFIX: &str = "role_";

/// A fixed policy set, typically built in code at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicySource {
    set: PolicySet,
}

impl StaticPolicySource {
    pub fn new(set: PolicySet) -> Self {
        Self { set }
    }
}

#[async_trait]
impl PolicySource for StaticPolicySource {
    async fn load(&self) -> Result<PolicySet, PolicyError> {
        Ok(self.set.clone())
    }
}

struct Snapshot {
    policies: Vec<Policy>,
    roles: HashMap<String, HashSet<String>>,
    default_roles: HashSet<String>,
}

impl Snapshot {
    fn from_set(set: PolicySet) -> Self {
        let mut roles: HashMap<String, HashSet<String>> = HashMap::new();
        for assignment in set.roles {
            roles
                .entry(assignment.subject)
                .or_default()
                .insert(assignment.role);
        }

        Self {
            policies: set.policies,
            roles,
            default_roles: set.default_roles.into_iter().collect(),
        }
    }

    fn subject_matches(&self, pattern: &str, subject: &str) -> bool {
        if pattern == "*" || pattern == subject {
            return true;
        }

        match pattern.strip_prefix(ROLE_PREFIX) {
            Some(role) => {
                self.default_roles.contains(role)
                    || self
                        .roles
                        .get(subject)
                        .is_some_and(|held| held.contains(role))
            }
            None => false,
        }
    }
}

/// Evaluates requests against an in-process copy of a [`PolicySource`].
///
/// The loaded set only changes through [`reload`](Self::reload); requests
/// being evaluated during a reload see either the old or the new set.
pub struct InMemoryPolicyOracle {
    source: Arc<dyn PolicySource>,
    matcher: Arc<dyn PolicyMatcher>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl InMemoryPolicyOracle {
    pub async fn load(source: Arc<dyn PolicySource>) -> Result<Self, PolicyError> {
        Self::load_with_matcher(source, Arc::new(KeyMatcher::new())).await
    }

    pub async fn load_with_matcher(
        source: Arc<dyn PolicySource>,
        matcher: Arc<dyn PolicyMatcher>,
    ) -> Result<Self, PolicyError> {
        let set = source.load().await?;
        info!(policies = set.policies.len(), roles = set.roles.len(), "loaded policy set");

        Ok(Self {
            source,
            matcher,
            snapshot: RwLock::new(Arc::new(Snapshot::from_set(set))),
        })
    }

    /// Convenience for a fixed policy set.
    pub async fn from_set(set: PolicySet) -> Result<Self, PolicyError> {
        Self::load(Arc::new(StaticPolicySource::new(set))).await
    }

    /// Re-reads the source and swaps the active set. On failure the
    /// previous set stays active.
    pub async fn reload(&self) -> Result<(), PolicyError> {
        let set = self.source.load().await?;
        info!(policies = set.policies.len(), roles = set.roles.len(), "reloaded policy set");
        *self.snapshot.write() = Arc::new(Snapshot::from_set(set));
        Ok(())
    }

    pub fn policy_count(&self) -> usize {
        self.snapshot.read().policies.len()
    }
}

#[async_trait]
impl PolicyOracle for InMemoryPolicyOracle {
    async fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        let snapshot = self.snapshot.read().clone();

        for policy in &snapshot.policies {
            if !snapshot.subject_matches(&policy.subject, subject) {
                continue;
            }
            if self.matcher.matches(&policy.object, object)?
                && self.matcher.matches(&policy.action, action)?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
