//! Role pass

use tracing::{debug, error, warn};

use super::{ResolvedPolicies, TransportFailure};
use crate::acl::{declared_id, RoleDecl};
use crate::consul::{AclApi, AclRole, AclRolePolicyLink};
use crate::naming::Owner;
use crate::status::{StatusReport, SyncAction};
use crate::Error;

/// Status text for roles declared without a name
pub(crate) const MISSING_ROLE_NAME: &str = "Some roles have not got a name";

pub(crate) async fn sync_roles(
    acl: &dyn AclApi,
    owner: &Owner,
    roles: &[RoleDecl],
    resolved: &ResolvedPolicies,
) -> Result<StatusReport, Error> {
    let mut report = StatusReport::default();
    let mut failure = TransportFailure::default();

    for decl in roles {
        if decl.name.is_empty() {
            warn!(owner = %owner, "skipping role without a name");
            report.record_missing_name(MISSING_ROLE_NAME);
            continue;
        }

        let name = owner.qualify(&decl.name);
        let policies = policy_links(owner, &name, decl, resolved);

        let id = match declared_id(&decl.id) {
            Some(id) => Some(id.to_string()),
            None => match acl.read_role_by_name(&name).await {
                Ok(existing) => existing.map(|r| r.id).filter(|id| !id.is_empty()),
                Err(e) => {
                    warn!(role = %name, error = %e, "role lookup failed, attempting create");
                    None
                }
            },
        };

        let role = AclRole {
            id: id.clone().unwrap_or_default(),
            name: name.clone(),
            description: decl.description.clone(),
            policies,
        };

        let result = match id {
            None => acl.create_role(&role).await.map(|_| SyncAction::Created),
            Some(_) => acl.update_role(&role).await.map(|_| SyncAction::Updated),
        };

        match result {
            Ok(action) => {
                debug!(role = %name, action = %action, links = role.policies.len(), "role synced");
                report.record(name, action);
            }
            Err(e) => {
                error!(role = %name, error = %e, "failed to sync role");
                let detail = failure.observe(e);
                report.record(name, SyncAction::Failed(detail));
            }
        }
    }

    failure.finish(report)
}

/// Links for every referenced policy resolved this cycle
///
/// References to policies that were not synced this cycle are left out.
fn policy_links(
    owner: &Owner,
    role: &str,
    decl: &RoleDecl,
    resolved: &ResolvedPolicies,
) -> Vec<AclRolePolicyLink> {
    decl.policy_names
        .iter()
        .filter_map(|short| {
            let policy = owner.qualify(short);
            match resolved.get(&policy) {
                Some(id) => Some(AclRolePolicyLink {
                    id: id.clone(),
                    name: policy,
                }),
                None => {
                    warn!(
                        role = %role,
                        policy = %policy,
                        "policy was not synced this cycle, omitting link"
                    );
                    None
                }
            }
        })
        .collect()
}
