//! Cluster adapter error types
//!
//! Maps kube-rs failures onto the project error taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the host or a tenant cluster
#[derive(Debug, Error)]
pub enum K8sError {
    /// Error from kube-rs client
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Kubeconfig could not be parsed or turned into a client
    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// The workspace credential secret is missing or incomplete
    #[error("Credentials unavailable for workspace {workspace_id}: {reason}")]
    CredentialsUnavailable { workspace_id: String, reason: String },

    /// Kubernetes resource not found
    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    /// The namespace already exists and is labelled for another project
    #[error("Namespace {name} belongs to project {owner}")]
    NamespaceOwnedElsewhere { name: String, owner: String },

    /// The call did not finish within the configured bound
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Internal system error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl K8sError {
    /// HTTP status of the API response, when the error came from the API server
    pub fn api_code(&self) -> Option<u16> {
        match self {
            K8sError::KubeError(kube::Error::Api(response)) => Some(response.code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404) || matches!(self, K8sError::ResourceNotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        self.api_code() == Some(409)
    }
}

impl From<K8sError> for kaas_common::Error {
    fn from(err: K8sError) -> Self {
        kaas_common::Error::Adapter(err.to_string())
    }
}

/// Result type alias for cluster operations
pub type K8sResult<T> = std::result::Result<T, K8sError>;

/// Treat a 404 from the API server as success
pub(crate) fn ignore_not_found(result: K8sResult<()>) -> K8sResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> K8sError {
    K8sError::KubeError(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} error", reason),
        reason: reason.to_string(),
        code,
    }))
}
