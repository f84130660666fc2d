//! Per-workspace client resolution
//!
//! Each workspace's isolated cluster publishes an admin kubeconfig as a
//! secret in the control namespace of the host cluster. Clients are built
//! fresh on every call; nothing is cached.

use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use tracing::debug;

use super::client::K8sClient;
use super::error::{K8sError, K8sResult};
use crate::config::ClusterConfig;

/// Builds tenant clients from credential secrets on the host cluster
#[derive(Clone)]
pub struct TenantClientResolver {
    host: K8sClient,
    config: ClusterConfig,
}

impl TenantClientResolver {
    pub fn new(host: K8sClient, config: ClusterConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Client scoped to the isolated cluster of `workspace_id`
    pub async fn resolve(&self, workspace_id: &str) -> K8sResult<K8sClient> {
        if workspace_id.is_empty() {
            return Err(K8sError::CredentialsUnavailable {
                workspace_id: String::new(),
                reason: "workspace id is empty".to_string(),
            });
        }

        let secret_name = self.config.credential_secret_name(workspace_id);
        debug!(
            workspace_id,
            secret = %secret_name,
            namespace = %self.config.control_namespace,
            "Resolving tenant cluster credentials"
        );

        let secrets: Api<Secret> =
            Api::namespaced(self.host.inner().clone(), &self.config.control_namespace);

        let secret = secrets.get_opt(&secret_name).await?.ok_or_else(|| {
            K8sError::CredentialsUnavailable {
                workspace_id: workspace_id.to_string(),
                reason: format!(
                    "secret {}/{} not found",
                    self.config.control_namespace, secret_name
                ),
            }
        })?;

        let kubeconfig = extract_kubeconfig(&secret, &self.config.credential_secret_key)
            .ok_or_else(|| K8sError::CredentialsUnavailable {
                workspace_id: workspace_id.to_string(),
                reason: format!(
                    "secret {} has no usable '{}' entry",
                    secret_name, self.config.credential_secret_key
                ),
            })?;

        K8sClient::from_kubeconfig(&kubeconfig, None, workspace_id).await
    }
}

/// Kubeconfig text stored under `key`, from either `data` or `stringData`
pub(crate) fn extract_kubeconfig(secret: &Secret, key: &str) -> Option<String> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return String::from_utf8(bytes.0.clone()).ok().filter(|s| !s.is_empty());
    }

    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(key))
        .filter(|s| !s.is_empty())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn test_extract_kubeconfig_from_data() {
        let secret = Secret {
            data: Some(BTreeMap::from([(
                "config".to_string(),
                ByteString(b"apiVersion: v1".to_vec()),
            )])),
            ..Default::default()
        };
        assert_eq!(extract_kubeconfig(&secret, "config").as_deref(), Some("apiVersion: v1"));
        assert!(extract_kubeconfig(&secret, "value").is_none());
    }

    #[test]
    fn test_extract_kubeconfig_from_string_data() {
        let secret = Secret {
            string_data: Some(BTreeMap::from([("config".to_string(), "kind: Config".to_string())])),
            ..Default::default()
        };
        assert_eq!(extract_kubeconfig(&secret, "config").as_deref(), Some("kind: Config"));
    }

    #[test]
    fn test_empty_entry_is_unusable() {
        let secret = Secret {
            data: Some(BTreeMap::from([("config".to_string(), ByteString(Vec::new()))])),
            ..Default::default()
        };
        assert!(extract_kubeconfig(&secret, "config").is_none());
    }
}
