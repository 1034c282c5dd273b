//! ACL entity payloads as the Consul HTTP API exchanges them

use serde::{Deserialize, Serialize};

/// Bind type used for every binding rule this operator manages
pub const BIND_TYPE_ROLE: &str = "role";

/// An ACL policy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclPolicy {
    /// Service-assigned identifier (empty until created)
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Qualified policy name
    #[serde(rename = "Name")]
    pub name: String,
    /// Free-text description
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// HCL or JSON rule body
    #[serde(rename = "Rules", default)]
    pub rules: String,
    /// Datacenters the policy is scoped to (empty = all)
    #[serde(rename = "Datacenters", default, skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,
}

/// Link from a role to a policy
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRolePolicyLink {
    /// Policy identifier
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Qualified policy name
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// An ACL role
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRole {
    /// Service-assigned identifier (empty until created)
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Qualified role name
    #[serde(rename = "Name")]
    pub name: String,
    /// Free-text description
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Policies granted by this role
    #[serde(rename = "Policies", default, deserialize_with = "null_as_empty")]
    pub policies: Vec<AclRolePolicyLink>,
}

/// An ACL binding rule
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclBindingRule {
    /// Service-assigned identifier (empty until created)
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Free-text description
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Auth method the rule belongs to
    #[serde(rename = "AuthMethod", default)]
    pub auth_method: String,
    /// Selector expression matched against the login's identity
    #[serde(rename = "Selector", default)]
    pub selector: String,
    /// What the rule binds to (always `role` here)
    #[serde(rename = "BindType", default)]
    pub bind_type: String,
    /// Qualified name of the bound role
    #[serde(rename = "BindName", default)]
    pub bind_name: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
