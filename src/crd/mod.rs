//! Custom Resource Definitions for the Consul ACL operator

mod consul_acl;

pub use consul_acl::{AclConfigSpec, ConsulACL, ConsulACLSpec, ConsulACLStatus};
