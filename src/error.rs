//! Error types for the Consul ACL operator

use thiserror::Error;

/// Main error type for ACL operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for ConsulACL specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Desired-state document could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The ACL service could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// The ACL service answered with a non-success status
    #[error("acl error ({status}): {message}")]
    Acl {
        /// HTTP status code returned by the service
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Invalid operator configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a transport error with the given message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an ACL service error for the given status code
    pub fn acl(status: u16, msg: impl Into<String>) -> Self {
        Self::Acl {
            status,
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the ACL service was unreachable
    ///
    /// Transport errors fail the whole reconcile cycle so it is rescheduled;
    /// every other ACL error is recorded against the entity that caused it.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// True when the ACL service reported the entity as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Acl { status: 404, .. })
    }

    /// True when the Kubernetes API rejected a write because of a stale resourceVersion
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(ae)) if ae.code == 409)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::acl(status.as_u16(), e.to_string()),
            None if e.is_decode() => Error::serialization(e.to_string()),
            None => Error::transport(e.to_string()),
        }
    }
}
