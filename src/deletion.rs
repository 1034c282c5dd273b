//! Ordered teardown of a ConsulACL's entities
//!
//! Binding rules go first, then roles, then policies, so the service never
//! holds a rule bound to a deleted role or a role linked to a deleted policy.
//! The first failure stops the sequence; the caller keeps its finalizer and
//! the next invocation starts over. Entities that are already gone are
//! skipped.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::acl::DesiredAclConfig;
use crate::consul::{AclApi, BIND_TYPE_ROLE};
use crate::naming::Owner;
use crate::Error;

/// Delete every entity declared by `desired` for `owner`
pub async fn delete_entities(
    acl: &dyn AclApi,
    owner: &Owner,
    desired: &DesiredAclConfig,
    auth_method: &str,
) -> Result<(), Error> {
    let rules = delete_binding_rules(acl, owner, desired, auth_method).await?;
    let roles = delete_roles(acl, owner, desired).await?;
    let policies = delete_policies(acl, owner, desired).await?;

    info!(
        owner = %owner,
        binding_rules = rules,
        roles,
        policies,
        "deleted ACL entities"
    );
    Ok(())
}

/// Scan the auth method's rules for ones bound to a declared role
async fn delete_binding_rules(
    acl: &dyn AclApi,
    owner: &Owner,
    desired: &DesiredAclConfig,
    auth_method: &str,
) -> Result<usize, Error> {
    let bind_names: HashSet<String> = desired
        .bind_rules
        .iter()
        .filter(|r| !r.bind_name.is_empty())
        .map(|r| owner.qualify(&r.bind_name))
        .collect();
    if bind_names.is_empty() {
        return Ok(0);
    }

    let mut deleted = 0;
    for rule in acl.list_binding_rules(auth_method).await? {
        // Matching on the qualified name keeps other owners' rules out of reach
        if rule.bind_type != BIND_TYPE_ROLE || !bind_names.contains(&rule.bind_name) {
            continue;
        }
        debug!(id = %rule.id, bind_name = %rule.bind_name, "deleting binding rule");
        ignore_not_found(acl.delete_binding_rule(&rule.id).await)?;
        deleted += 1;
    }
    Ok(deleted)
}

async fn delete_roles(
    acl: &dyn AclApi,
    owner: &Owner,
    desired: &DesiredAclConfig,
) -> Result<usize, Error> {
    let mut deleted = 0;
    for decl in desired.roles.iter().filter(|r| !r.name.is_empty()) {
        let name = owner.qualify(&decl.name);
        match acl.read_role_by_name(&name).await? {
            Some(role) => {
                debug!(role = %name, id = %role.id, "deleting role");
                ignore_not_found(acl.delete_role(&role.id).await)?;
                deleted += 1;
            }
            None => debug!(role = %name, "role already absent"),
        }
    }
    Ok(deleted)
}

async fn delete_policies(
    acl: &dyn AclApi,
    owner: &Owner,
    desired: &DesiredAclConfig,
) -> Result<usize, Error> {
    let mut deleted = 0;
    for decl in desired.policies.iter().filter(|p| !p.name.is_empty()) {
        let name = owner.qualify(&decl.name);
        match acl.read_policy_by_name(&name).await? {
            Some(policy) => {
                debug!(policy = %name, id = %policy.id, "deleting policy");
                ignore_not_found(acl.delete_policy(&policy.id).await)?;
                deleted += 1;
            }
            None => debug!(policy = %name, "policy already absent"),
        }
    }
    Ok(deleted)
}

fn ignore_not_found(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
