//! ACL entity syncers
//!
//! One reconcile cycle runs three passes in a fixed order: policies, then
//! roles (which link to the policy IDs resolved by the first pass), then
//! binding rules. Each pass records one outcome per declared entity and keeps
//! going past per-entity failures. A transport failure is remembered and
//! returned once the pass has visited every entity, which fails the cycle.

mod binding_rule;
mod policy;
mod role;

use std::sync::Arc;

use tracing::{debug, info};

pub use policy::ResolvedPolicies;

use crate::acl::DesiredAclConfig;
use crate::config::{BindRuleMode, OperatorConfig};
use crate::consul::AclApi;
use crate::deletion;
use crate::naming::Owner;
use crate::status::AclStatusSummary;
use crate::Error;

/// Drives the ACL service to the state declared by one ConsulACL
pub struct AclEngine {
    acl: Arc<dyn AclApi>,
    auth_method: String,
    bind_rule_mode: BindRuleMode,
}

impl AclEngine {
    /// Create an engine from the operator configuration
    pub fn new(acl: Arc<dyn AclApi>, config: &OperatorConfig) -> Self {
        Self::with_settings(acl, config.auth_method.clone(), config.bind_rule_mode)
    }

    /// Create an engine with explicit settings
    pub fn with_settings(
        acl: Arc<dyn AclApi>,
        auth_method: impl Into<String>,
        bind_rule_mode: BindRuleMode,
    ) -> Self {
        Self {
            acl,
            auth_method: auth_method.into(),
            bind_rule_mode,
        }
    }

    /// Auth method binding rules are attached to
    pub fn auth_method(&self) -> &str {
        &self.auth_method
    }

    /// Run one sync cycle and render the per-kind status summaries
    ///
    /// Returns an error only when the ACL service was unreachable; every other
    /// failure is reported inside the summaries.
    pub async fn apply(
        &self,
        owner: &Owner,
        desired: &DesiredAclConfig,
    ) -> Result<AclStatusSummary, Error> {
        debug!(
            owner = %owner,
            policies = desired.policies.len(),
            roles = desired.roles.len(),
            bind_rules = desired.bind_rules.len(),
            "syncing ACL entities"
        );

        let (resolved, policies) =
            policy::sync_policies(self.acl.as_ref(), owner, &desired.policies).await?;
        let roles = role::sync_roles(self.acl.as_ref(), owner, &desired.roles, &resolved).await?;
        let bind_rules = binding_rule::sync_binding_rules(
            self.acl.as_ref(),
            owner,
            &desired.bind_rules,
            &self.auth_method,
            self.bind_rule_mode,
        )
        .await?;

        let summary = AclStatusSummary::from_reports(&policies, &roles, &bind_rules);
        info!(
            owner = %owner,
            policies = %summary.policies,
            roles = %summary.roles,
            bind_rules = %summary.bind_rules,
            "ACL sync cycle complete"
        );
        Ok(summary)
    }

    /// Delete every entity declared by `desired`, binding rules first
    pub async fn delete(&self, owner: &Owner, desired: &DesiredAclConfig) -> Result<(), Error> {
        deletion::delete_entities(self.acl.as_ref(), owner, desired, &self.auth_method).await
    }
}

/// First transport failure seen during a pass
#[derive(Default)]
struct TransportFailure(Option<Error>);

impl TransportFailure {
    /// Keep `err` if it is the first transport failure and return its text
    fn observe(&mut self, err: Error) -> String {
        let detail = err.to_string();
        if err.is_transport() && self.0.is_none() {
            self.0 = Some(err);
        }
        detail
    }

    /// Fail the pass if a transport failure was seen
    fn finish<T>(self, value: T) -> Result<T, Error> {
        match self.0 {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}
