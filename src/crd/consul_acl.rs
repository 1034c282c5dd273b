//! ConsulACL Custom Resource Definition
//!
//! A ConsulACL declares the Consul ACL policies, roles and binding rules one
//! application needs. The entities themselves travel as an opaque JSON
//! document in `spec.acl.json`; the operator writes one summary per entity
//! kind back to the status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::acl::DesiredAclConfig;
use crate::status::AclStatusSummary;

/// Specification for a ConsulACL
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "qubership.org",
    version = "v1alpha1",
    kind = "ConsulACL",
    plural = "consulacls",
    status = "ConsulACLStatus",
    namespaced,
    printcolumn = r#"{"name":"Config","type":"string","jsonPath":".spec.acl.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ConsulACLSpec {
    /// ACL configuration
    pub acl: AclConfigSpec,
}

/// The `spec.acl` block
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AclConfigSpec {
    /// Desired policies, roles and binding rules as a JSON document
    #[serde(default)]
    pub json: String,

    /// Informational name of this configuration
    #[serde(default)]
    pub name: String,

    /// Changed by external tooling to force a new reconcile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_reconcile: Option<String>,
}

impl ConsulACLSpec {
    /// Decode the embedded desired-state document
    pub fn desired_config(&self) -> Result<DesiredAclConfig, crate::Error> {
        DesiredAclConfig::from_json(&self.acl.json)
    }
}

/// Status for a ConsulACL
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsulACLStatus {
    /// Outcome of the last policy pass
    #[serde(default)]
    pub policies_status: String,

    /// Outcome of the last role pass
    #[serde(default)]
    pub roles_status: String,

    /// Outcome of the last binding rule pass
    #[serde(default)]
    pub bind_rules_status: String,

    /// Generation the summaries were computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ConsulACLStatus {
    /// Build a status from a sync cycle's summaries
    pub fn from_summary(summary: AclStatusSummary, observed_generation: Option<i64>) -> Self {
        Self {
            policies_status: summary.policies,
            roles_status: summary.roles,
            bind_rules_status: summary.bind_rules,
            observed_generation,
        }
    }
}
