//! ACL service adapter
//!
//! The syncers and the deletion coordinator only talk to the ACL service
//! through [`AclApi`]. [`ConsulAclClient`] is the HTTP implementation used in
//! production; tests substitute mocks or an in-memory fake.

mod client;
mod types;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub use client::ConsulAclClient;
pub use types::{AclBindingRule, AclPolicy, AclRole, AclRolePolicyLink, BIND_TYPE_ROLE};

use crate::Error;

/// Operations consumed from the ACL service
///
/// Lookups return `Ok(None)` when the entity does not exist. Mutations return
/// the entity as stored by the service, carrying its assigned ID.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AclApi: Send + Sync {
    /// Look up a policy by qualified name
    async fn read_policy_by_name(&self, name: &str) -> Result<Option<AclPolicy>, Error>;

    /// Create a policy
    async fn create_policy(&self, policy: &AclPolicy) -> Result<AclPolicy, Error>;

    /// Update the policy identified by `policy.id`
    async fn update_policy(&self, policy: &AclPolicy) -> Result<AclPolicy, Error>;

    /// Delete a policy by ID
    async fn delete_policy(&self, id: &str) -> Result<(), Error>;

    /// Look up a role by qualified name
    async fn read_role_by_name(&self, name: &str) -> Result<Option<AclRole>, Error>;

    /// Create a role
    async fn create_role(&self, role: &AclRole) -> Result<AclRole, Error>;

    /// Update the role identified by `role.id`
    async fn update_role(&self, role: &AclRole) -> Result<AclRole, Error>;

    /// Delete a role by ID
    async fn delete_role(&self, id: &str) -> Result<(), Error>;

    /// List every binding rule of an auth method
    async fn list_binding_rules(&self, auth_method: &str) -> Result<Vec<AclBindingRule>, Error>;

    /// Create a binding rule
    async fn create_binding_rule(&self, rule: &AclBindingRule) -> Result<AclBindingRule, Error>;

    /// Update the binding rule identified by `rule.id`
    async fn update_binding_rule(&self, rule: &AclBindingRule) -> Result<AclBindingRule, Error>;

    /// Delete a binding rule by ID
    async fn delete_binding_rule(&self, id: &str) -> Result<(), Error>;
}
