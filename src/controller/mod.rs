//! Controller implementations for the operator's CRDs
//!
//! Controllers follow the Kubernetes controller pattern: observe the declared
//! state, drive the external system towards it, and record the outcome.

mod consul_acl;

pub use consul_acl::{error_policy, reconcile, Context, KubeClient, KubeClientImpl};
