//! Consul ACL Operator - keeps Consul ACL entities in line with ConsulACL resources

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use consul_acl_operator::config::{OperatorArgs, OperatorConfig};
use consul_acl_operator::consul::ConsulAclClient;
use consul_acl_operator::controller::{error_policy, reconcile, Context};
use consul_acl_operator::crd::ConsulACL;
use consul_acl_operator::health::{self, Readiness};

/// Consul ACL operator - reconciles ConsulACL resources into Consul policies, roles and binding rules
#[derive(Parser, Debug)]
#[command(name = "consul-acl-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Install or update the ConsulACL CRD before starting the controller
    #[arg(long, env = "INSTALL_CRD")]
    install_crd: bool,

    #[command(flatten)]
    operator: OperatorArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube and reqwest both use rustls; pin one process-wide provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&ConsulACL::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let config = cli.operator.into_config()?;
    init_tracing(config.log_json);

    run_controller(config, cli.install_crd).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Ensure the ConsulACL CRD is installed
///
/// Uses server-side apply so the CRD always matches the operator version.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply("consul-acl-operator").force();

    tracing::info!("Installing ConsulACL CRD...");
    crds.patch(
        "consulacls.qubership.org",
        &params,
        &Patch::Apply(&ConsulACL::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install ConsulACL CRD: {}", e))?;

    Ok(())
}

/// Run the ConsulACL controller and the probe server until shutdown
async fn run_controller(config: OperatorConfig, install_crd: bool) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if install_crd {
        ensure_crd_installed(&client).await?;
    }

    let acl_client = ConsulAclClient::new(&config.consul)?;
    let ctx = Arc::new(Context::new(client.clone(), Arc::new(acl_client), &config));

    let acls: Api<ConsulACL> = match &config.watch_namespace {
        Some(namespace) => {
            tracing::info!(namespace = %namespace, "Watching ConsulACLs in a single namespace");
            Api::namespaced(client, namespace)
        }
        None => {
            tracing::info!("Watching ConsulACLs in all namespaces");
            Api::all(client)
        }
    };

    let readiness = Readiness::default();
    let probes = health::serve(config.health_probe_addr, readiness.clone());

    tracing::info!(
        consul = %config.consul.base_url(),
        auth_method = %config.auth_method,
        bind_rule_mode = ?config.bind_rule_mode,
        "Starting ConsulACL controller"
    );

    let controller = Controller::new(acls, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "ConsulACL reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "ConsulACL reconciliation error");
                }
            }
        });
    readiness.mark_ready();

    tokio::select! {
        _ = controller => {
            tracing::info!("ConsulACL controller completed");
        }
        result = probes => {
            result?;
        }
    }

    tracing::info!("Consul ACL operator shutting down");
    Ok(())
}
