//! Service-visible names for ACL entities
//!
//! The ACL service has a single flat namespace per entity kind, so every
//! declared name is prefixed with the identity of the ConsulACL that owns it.
//! Role → policy references go through the same function, which is what makes
//! a reference and its target agree.

use std::fmt;

/// Identity of the ConsulACL resource that owns a set of ACL entities
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Owner {
    /// metadata.name of the ConsulACL
    pub name: String,
    /// metadata.namespace of the ConsulACL
    pub namespace: String,
}

impl Owner {
    /// Create an owner identity
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Qualify a declared short name for this owner
    pub fn qualify(&self, short_name: &str) -> String {
        qualify(&self.name, &self.namespace, short_name)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Derive the service-visible name `{owner}_{namespace}_{short}`
///
/// Kubernetes object names and namespaces cannot contain `_`, so the prefix
/// is unambiguous.
pub fn qualify(owner_name: &str, owner_namespace: &str, short_name: &str) -> String {
    format!("{}_{}_{}", owner_name, owner_namespace, short_name)
}
