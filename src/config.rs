//! Operator configuration
//!
//! Everything the operator needs from its environment is parsed once at
//! startup into an [`OperatorConfig`] and handed to the controller context.
//! Nothing below `main` reads environment variables directly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use secrecy::SecretString;

use crate::Error;

/// Default location of the Consul CA certificate mounted into the operator pod
pub const DEFAULT_CA_CERT_PATH: &str = "/consul/tls/ca/tls.crt";

/// How binding rules are written on each reconcile cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum BindRuleMode {
    /// Look up existing rules by bind name and update them, create the rest
    #[default]
    Upsert,
    /// Issue a create for every declared rule on every cycle
    AlwaysCreate,
}

/// Connection settings for the Consul HTTP API
#[derive(Clone, Debug)]
pub struct ConsulConfig {
    /// Consul host name or address
    pub host: String,
    /// Consul HTTP(S) port
    pub port: u16,
    /// `http` or `https`
    pub scheme: String,
    /// ACL token with permission to manage policies, roles and binding rules
    pub token: Option<SecretString>,
    /// PEM CA bundle trusted for HTTPS connections
    pub ca_cert_path: Option<PathBuf>,
}

impl ConsulConfig {
    /// Base URL of the Consul HTTP API
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Validated operator configuration
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Consul connection settings
    pub consul: ConsulConfig,
    /// Auth method every managed binding rule is attached to
    pub auth_method: String,
    /// Delay before a failed cycle is retried
    pub reconcile_period: Duration,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// Listen address for the health probe server
    pub health_probe_addr: SocketAddr,
    /// Binding rule write strategy
    pub bind_rule_mode: BindRuleMode,
    /// Emit logs as JSON
    pub log_json: bool,
}

impl OperatorConfig {
    /// Reject settings the operator cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.consul.host.trim().is_empty() {
            return Err(Error::config("Consul host must not be empty"));
        }
        if !matches!(self.consul.scheme.as_str(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported Consul scheme '{}', expected http or https",
                self.consul.scheme
            )));
        }
        if self.auth_method.trim().is_empty() {
            return Err(Error::config("auth method name must not be empty"));
        }
        if self.reconcile_period.is_zero() {
            return Err(Error::config("reconcile period must be greater than zero"));
        }
        Ok(())
    }
}

/// Command line / environment arguments for the controller
#[derive(Args, Debug, Clone)]
pub struct OperatorArgs {
    /// Consul host
    #[arg(long, env = "CONSUL_HOST", default_value = "localhost")]
    pub consul_host: String,

    /// Consul HTTP port
    #[arg(long, env = "CONSUL_PORT", default_value_t = 8500)]
    pub consul_port: u16,

    /// Consul URL scheme
    #[arg(long, env = "CONSUL_SCHEME", default_value = "http")]
    pub consul_scheme: String,

    /// ACL token used for every Consul request
    #[arg(long, env = "CONSUL_ACL_BOOTSTRAP_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    /// CA certificate for HTTPS (ignored if the file does not exist)
    #[arg(long, env = "CONSUL_CA_CERT", default_value = DEFAULT_CA_CERT_PATH)]
    pub consul_ca_cert: PathBuf,

    /// Auth method for managed binding rules (required to run the controller)
    #[arg(long, env = "CONSUL_AUTH_METHOD_NAME", default_value = "")]
    pub auth_method: String,

    /// Seconds to wait before retrying a failed reconcile cycle
    #[arg(long, env = "RECONCILE_PERIOD_SECONDS", default_value_t = 30)]
    pub reconcile_period_secs: u64,

    /// Namespace to watch (empty = all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    pub watch_namespace: String,

    /// Listen address for /healthz and /readyz
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = "0.0.0.0:8081")]
    pub health_probe_bind_address: SocketAddr,

    /// Binding rule write strategy
    #[arg(long, env = "BIND_RULE_MODE", value_enum, default_value_t = BindRuleMode::Upsert)]
    pub bind_rule_mode: BindRuleMode,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl OperatorArgs {
    /// Convert parsed arguments into a validated configuration
    pub fn into_config(self) -> Result<OperatorConfig, Error> {
        let ca_cert_path = self.consul_ca_cert.exists().then_some(self.consul_ca_cert);
        let watch_namespace = Some(self.watch_namespace.trim().to_string()).filter(|ns| !ns.is_empty());

        let config = OperatorConfig {
            consul: ConsulConfig {
                host: self.consul_host,
                port: self.consul_port,
                scheme: self.consul_scheme,
                token: self
                    .consul_token
                    .filter(|t| !t.is_empty())
                    .map(SecretString::from),
                ca_cert_path,
            },
            auth_method: self.auth_method,
            reconcile_period: Duration::from_secs(self.reconcile_period_secs),
            watch_namespace,
            health_probe_addr: self.health_probe_bind_address,
            bind_rule_mode: self.bind_rule_mode,
            log_json: self.log_json,
        };
        config.validate()?;
        Ok(config)
    }
}
