//! ConsulACL controller implementation
//!
//! A live ConsulACL gets the operator's finalizer, then is synced to Consul on
//! every reconcile and the three summaries are written to its status when
//! they change. A
//! ConsulACL being deleted has its entities torn down before the finalizer is
//! released.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument};

#[cfg(test)]
use mockall::automock;

use crate::config::OperatorConfig;
use crate::consul::AclApi;
use crate::crd::{ConsulACL, ConsulACLStatus};
use crate::naming::Owner;
use crate::retry::retry_on_conflict;
use crate::sync::AclEngine;
use crate::{Error, FINALIZER};

/// Field manager recorded on every patch this controller makes
const FIELD_MANAGER: &str = "consul-acl-operator";

/// Trait abstracting Kubernetes client operations for ConsulACL
///
/// Every write re-reads the object and sends its resourceVersion along, so a
/// concurrent writer causes a 409 that is retried against the fresh copy.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Add a finalizer to a ConsulACL if it is not already present
    async fn add_finalizer(&self, name: &str, namespace: &str, finalizer: &str)
        -> Result<(), Error>;

    /// Remove a finalizer from a ConsulACL
    async fn remove_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error>;

    /// Replace the status of a ConsulACL
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &ConsulACLStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ConsulACL> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn add_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let api = &self.api(namespace);
        retry_on_conflict("add_finalizer", move || async move {
            let acl = api.get(name).await?;
            let mut finalizers = acl.metadata.finalizers.unwrap_or_default();
            if finalizers.iter().any(|f| f == finalizer) {
                return Ok(());
            }
            finalizers.push(finalizer.to_string());

            let patch = serde_json::json!({
                "metadata": {
                    "finalizers": finalizers,
                    "resourceVersion": acl.metadata.resource_version,
                }
            });
            api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
                .await?;
            Ok(())
        })
        .await
    }

    async fn remove_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        let api = &self.api(namespace);
        retry_on_conflict("remove_finalizer", move || async move {
            let acl = api.get(name).await?;
            let finalizers: Vec<String> = acl
                .metadata
                .finalizers
                .unwrap_or_default()
                .into_iter()
                .filter(|f| f != finalizer)
                .collect();

            let patch = serde_json::json!({
                "metadata": {
                    "finalizers": finalizers,
                    "resourceVersion": acl.metadata.resource_version,
                }
            });
            api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
                .await?;
            Ok(())
        })
        .await
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &ConsulACLStatus,
    ) -> Result<(), Error> {
        let api = &self.api(namespace);
        retry_on_conflict("patch_status", move || async move {
            let current = api.get_status(name).await?;
            let patch = serde_json::json!({
                "metadata": { "resourceVersion": current.metadata.resource_version },
                "status": status,
            });
            api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
                .await?;
            Ok(())
        })
        .await
    }
}

/// Controller context shared by every reconcile
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Sync engine bound to the ACL service
    pub engine: AclEngine,
    /// Delay before a failed reconcile is retried
    pub reconcile_period: Duration,
}

impl Context {
    /// Create a controller context from the operator configuration
    pub fn new(client: Client, acl: Arc<dyn AclApi>, config: &OperatorConfig) -> Self {
        Self {
            kube: Arc::new(KubeClientImpl::new(client)),
            engine: AclEngine::new(acl, config),
            reconcile_period: config.reconcile_period,
        }
    }

    /// Create a context for testing with custom mock clients
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, acl: Arc<dyn AclApi>) -> Self {
        Self {
            kube,
            engine: AclEngine::with_settings(
                acl,
                "kubernetes",
                crate::config::BindRuleMode::Upsert,
            ),
            reconcile_period: Duration::from_secs(30),
        }
    }
}

/// Reconcile a ConsulACL
///
/// Returns `await_change` on success. Errors (undecodable document, ACL
/// service unreachable, Kubernetes writes failing) leave the previous status
/// untouched and are requeued by [`error_policy`].
#[instrument(skip(acl, ctx), fields(consul_acl = %acl.name_any(), namespace = ?acl.namespace()))]
pub async fn reconcile(acl: Arc<ConsulACL>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = acl.name_any();
    let namespace = acl
        .namespace()
        .ok_or_else(|| Error::validation("ConsulACL has no namespace"))?;
    let owner = Owner::new(&name, &namespace);

    if acl.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&acl, &owner, &ctx).await;
    }

    if !has_finalizer(&acl) {
        info!("adding finalizer");
        ctx.kube.add_finalizer(&name, &namespace, FINALIZER).await?;
    }

    info!("reconciling ConsulACL");
    let desired = acl.spec.desired_config()?;
    let summary = ctx.engine.apply(&owner, &desired).await?;

    let status = ConsulACLStatus::from_summary(summary, acl.metadata.generation);
    if acl.status.as_ref() == Some(&status) {
        debug!("status unchanged");
    } else {
        ctx.kube.patch_status(&name, &namespace, &status).await?;
    }

    Ok(Action::await_change())
}

/// Tear down the ConsulACL's entities, then release the finalizer
async fn handle_deletion(acl: &ConsulACL, owner: &Owner, ctx: &Context) -> Result<Action, Error> {
    if !has_finalizer(acl) {
        return Ok(Action::await_change());
    }

    info!("deleting ACL entities");
    let desired = acl.spec.desired_config()?;
    ctx.engine.delete(owner, &desired).await?;

    ctx.kube
        .remove_finalizer(&owner.name, &owner.namespace, FINALIZER)
        .await?;
    info!("finalizer removed");
    Ok(Action::await_change())
}

/// Error policy for the controller
///
/// Every failure is retried after the configured reconcile period.
pub fn error_policy(acl: Arc<ConsulACL>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        consul_acl = %acl.name_any(),
        namespace = ?acl.namespace(),
        "reconciliation failed"
    );
    Action::requeue(ctx.reconcile_period)
}

fn has_finalizer(acl: &ConsulACL) -> bool {
    acl.finalizers().iter().any(|f| f == FINALIZER)
}
