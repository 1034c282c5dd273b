//! Desired-state ACL document
//!
//! The ConsulACL resource carries its desired ACL entities as an opaque JSON
//! string. Field names are accepted both in the documented snake/lower case
//! and in the PascalCase the Consul API itself uses.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::Error;

/// Desired ACL entities for one ConsulACL
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DesiredAclConfig {
    /// Policies, in declaration order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub policies: Vec<PolicyDecl>,
    /// Roles, in declaration order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub roles: Vec<RoleDecl>,
    /// Binding rules, in declaration order
    #[serde(default, alias = "bindRules", deserialize_with = "null_as_empty")]
    pub bind_rules: Vec<BindRuleDecl>,
}

impl DesiredAclConfig {
    /// Decode the JSON document embedded in a ConsulACL spec
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::serialization(format!("invalid ACL configuration: {e}")))
    }

    /// True if nothing is declared
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.roles.is_empty() && self.bind_rules.is_empty()
    }
}

/// A declared policy
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PolicyDecl {
    /// Short name, qualified before it reaches the service
    #[serde(default, alias = "Name")]
    pub name: String,
    /// Explicit service ID; skips the lookup by name when set
    #[serde(default, alias = "ID", alias = "Id")]
    pub id: Option<String>,
    /// Rule body
    #[serde(default, alias = "Rules")]
    pub rules: String,
    /// Description
    #[serde(default, alias = "Description")]
    pub description: String,
    /// Datacenter scope
    #[serde(default, alias = "Datacenters", deserialize_with = "null_as_empty")]
    pub datacenters: Vec<String>,
}

/// A declared role
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RoleDecl {
    /// Explicit service ID; skips the lookup by name when set
    #[serde(default, alias = "ID", alias = "Id")]
    pub id: Option<String>,
    /// Short name, qualified before it reaches the service
    #[serde(default, alias = "Name")]
    pub name: String,
    /// Description
    #[serde(default, alias = "Description")]
    pub description: String,
    /// Short names of the policies this role grants
    #[serde(
        default,
        alias = "policyNames",
        alias = "PolicyNames",
        deserialize_with = "null_as_empty"
    )]
    pub policy_names: BTreeSet<String>,
}

/// A declared binding rule
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BindRuleDecl {
    /// Explicit service ID; updates that rule instead of searching
    #[serde(default, alias = "ID", alias = "Id")]
    pub id: Option<String>,
    /// Description
    #[serde(default, alias = "Description")]
    pub description: String,
    /// Service account allowed to log in through the rule
    #[serde(
        default,
        rename = "ServiceAccountName",
        alias = "serviceAccountName",
        alias = "service_account_name"
    )]
    pub service_account_name: String,
    /// Short name of the role the rule binds to
    #[serde(
        default,
        rename = "BindName",
        alias = "bindName",
        alias = "bind_name"
    )]
    pub bind_name: String,
}

/// Treat an explicit empty string ID as "no ID"
pub(crate) fn declared_id(id: &Option<String>) -> Option<&str> {
    id.as_deref().filter(|id| !id.is_empty())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
