//! Consul ACL operator - CRD-driven management of Consul ACL entities
//!
//! Each `ConsulACL` resource declares Consul ACL policies, roles and binding
//! rules for one application. The operator keeps Consul in line with those
//! declarations, reports a per-entity summary in the resource status, and
//! removes the entities again when the resource is deleted.
//!
//! # Architecture
//!
//! Entities are written in dependency order on every cycle:
//! - policies first, collecting the IDs Consul assigns them
//! - roles next, linked to the policies resolved in the same cycle
//! - binding rules last, binding a service account to a role
//!
//! Deletion runs the same chain backwards before the finalizer is released.
//!
//! # Modules
//!
//! - [`crd`] - The `ConsulACL` Custom Resource Definition
//! - [`controller`] - Kubernetes reconcile loop, finalizer and status handling
//! - [`sync`] - Policy, role and binding rule syncers
//! - [`deletion`] - Ordered teardown of a resource's entities
//! - [`consul`] - ACL service adapter (trait + HTTP client)
//! - [`acl`] - Desired-state document decoding
//! - [`naming`] - Service-visible entity names
//! - [`status`] - Sync outcomes and status summaries
//! - [`config`] - Operator configuration
//! - [`health`] - Liveness and readiness probes
//! - [`retry`] - Conflict retry with backoff
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod acl;
pub mod config;
pub mod consul;
pub mod controller;
pub mod crd;
pub mod deletion;
pub mod error;
pub mod health;
pub mod naming;
pub mod retry;
pub mod status;
pub mod sync;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Finalizer marking a ConsulACL whose entities must be deleted before it goes away
pub const FINALIZER: &str = "qubership.org/consulaclconfigurator-controller";
