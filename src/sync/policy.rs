//! Policy pass

use std::collections::BTreeMap;

use tracing::{debug, error, warn};

use super::TransportFailure;
use crate::acl::{declared_id, PolicyDecl};
use crate::consul::{AclApi, AclPolicy};
use crate::naming::Owner;
use crate::status::{StatusReport, SyncAction};
use crate::Error;

/// Status text for policies declared without a name
pub(crate) const MISSING_POLICY_NAME: &str = "Some policies have not got a name";

/// Qualified policy name → service-assigned ID, for policies synced this cycle
pub type ResolvedPolicies = BTreeMap<String, String>;

pub(crate) async fn sync_policies(
    acl: &dyn AclApi,
    owner: &Owner,
    policies: &[PolicyDecl],
) -> Result<(ResolvedPolicies, StatusReport), Error> {
    let mut resolved = ResolvedPolicies::new();
    let mut report = StatusReport::default();
    let mut failure = TransportFailure::default();

    for decl in policies {
        if decl.name.is_empty() {
            warn!(owner = %owner, "skipping policy without a name");
            report.record_missing_name(MISSING_POLICY_NAME);
            continue;
        }

        let name = owner.qualify(&decl.name);
        let id = match declared_id(&decl.id) {
            Some(id) => Some(id.to_string()),
            None => match acl.read_policy_by_name(&name).await {
                Ok(existing) => existing.map(|p| p.id).filter(|id| !id.is_empty()),
                Err(e) => {
                    warn!(policy = %name, error = %e, "policy lookup failed, attempting create");
                    None
                }
            },
        };

        let policy = AclPolicy {
            id: id.clone().unwrap_or_default(),
            name: name.clone(),
            description: decl.description.clone(),
            rules: decl.rules.clone(),
            datacenters: decl.datacenters.clone(),
        };

        let result = match id {
            None => acl
                .create_policy(&policy)
                .await
                .map(|stored| (stored, SyncAction::Created)),
            Some(_) => acl
                .update_policy(&policy)
                .await
                .map(|stored| (stored, SyncAction::Updated)),
        };

        match result {
            Ok((stored, action)) => {
                let id = if stored.id.is_empty() {
                    policy.id
                } else {
                    stored.id
                };
                debug!(policy = %name, id = %id, action = %action, "policy synced");
                resolved.insert(name.clone(), id);
                report.record(name, action);
            }
            Err(e) => {
                error!(policy = %name, error = %e, "failed to sync policy");
                let detail = failure.observe(e);
                report.record(name, SyncAction::Failed(detail));
            }
        }
    }

    failure.finish((resolved, report))
}
