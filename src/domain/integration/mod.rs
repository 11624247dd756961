//! Integration module - campaign ↔ group bindings and their access policy.

mod access_policy;
mod aggregate;

pub use access_policy::AccessPolicy;
pub use aggregate::{ApiKey, GroupBinding, Integration, ProviderCredentials};
