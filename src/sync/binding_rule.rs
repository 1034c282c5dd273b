//! Binding rule pass

use std::collections::HashSet;

use tracing::{debug, error, warn};

use super::TransportFailure;
use crate::acl::{declared_id, BindRuleDecl};
use crate::config::BindRuleMode;
use crate::consul::{AclApi, AclBindingRule, BIND_TYPE_ROLE};
use crate::naming::Owner;
use crate::status::{StatusReport, SyncAction};
use crate::Error;

/// Status text for binding rules declared without a bind name
pub(crate) const MISSING_BIND_RULE_NAME: &str = "Some binding rules have not got a name";

/// Selector matching one service account in the owner's namespace
pub(crate) fn service_account_selector(namespace: &str, service_account: &str) -> String {
    format!(
        "serviceaccount.namespace==\"{}\" and serviceaccount.name==\"{}\"",
        namespace, service_account
    )
}

/// Status label for a successfully written rule
pub(crate) fn success_label(bind_name: &str) -> String {
    format!("Bind rule for role with name {}", bind_name)
}

pub(crate) async fn sync_binding_rules(
    acl: &dyn AclApi,
    owner: &Owner,
    rules: &[BindRuleDecl],
    auth_method: &str,
    mode: BindRuleMode,
) -> Result<StatusReport, Error> {
    let mut report = StatusReport::default();
    let mut failure = TransportFailure::default();

    // Existing rules are listed once per pass; a failed listing fails every
    // named rule without writing anything.
    let needs_listing = mode == BindRuleMode::Upsert
        && rules
            .iter()
            .any(|r| !r.bind_name.is_empty() && declared_id(&r.id).is_none());
    let existing = if needs_listing {
        match acl.list_binding_rules(auth_method).await {
            Ok(existing) => Ok(existing),
            Err(e) => {
                error!(auth_method = %auth_method, error = %e, "failed to list binding rules");
                Err(failure.observe(e))
            }
        }
    } else {
        Ok(Vec::new())
    };

    let mut claimed: HashSet<String> = HashSet::new();

    for decl in rules {
        if decl.bind_name.is_empty() {
            warn!(owner = %owner, "skipping binding rule without a bind name");
            report.record_missing_name(MISSING_BIND_RULE_NAME);
            continue;
        }

        let bind_name = owner.qualify(&decl.bind_name);

        let id = match (mode, declared_id(&decl.id), &existing) {
            (BindRuleMode::AlwaysCreate, _, _) => None,
            (BindRuleMode::Upsert, Some(id), _) => Some(id.to_string()),
            (BindRuleMode::Upsert, None, Ok(existing)) => existing
                .iter()
                .find(|r| {
                    r.bind_name == bind_name
                        && r.bind_type == BIND_TYPE_ROLE
                        && !claimed.contains(&r.id)
                })
                .map(|r| r.id.clone()),
            (BindRuleMode::Upsert, None, Err(detail)) => {
                report.record(bind_name, SyncAction::Failed(detail.clone()));
                continue;
            }
        };
        if let Some(id) = &id {
            claimed.insert(id.clone());
        }

        let rule = AclBindingRule {
            id: id.clone().unwrap_or_default(),
            description: decl.description.clone(),
            auth_method: auth_method.to_string(),
            selector: service_account_selector(&owner.namespace, &decl.service_account_name),
            bind_type: BIND_TYPE_ROLE.to_string(),
            bind_name: bind_name.clone(),
        };

        let result = match id {
            None => acl.create_binding_rule(&rule).await.map(|_| SyncAction::Created),
            Some(_) => acl.update_binding_rule(&rule).await.map(|_| SyncAction::Updated),
        };

        match result {
            Ok(action) => {
                debug!(bind_name = %bind_name, action = %action, "binding rule synced");
                report.record(success_label(&bind_name), action);
            }
            Err(e) => {
                error!(bind_name = %bind_name, error = %e, "failed to sync binding rule");
                let detail = failure.observe(e);
                report.record(bind_name, SyncAction::Failed(detail));
            }
        }
    }

    failure.finish(report)
}
