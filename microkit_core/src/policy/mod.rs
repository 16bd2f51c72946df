//! Policy oracle: decides whether a subject may perform an action on an object

pub mod defaults;
pub mod matcher;
pub mod memory;
pub mod oracle;

pub use defaults::default_policies;
pub use matcher::{FnMatcher, KeyMatcher, PolicyMatcher};
pub use memory::{InMemoryPolicyOracle, StaticPolicySource};
pub use oracle::{Policy, PolicyError, PolicyOracle, PolicySet, PolicySource, RoleAssignment};
