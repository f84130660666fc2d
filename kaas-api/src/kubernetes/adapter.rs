//! vCluster-backed cluster projection
//!
//! Resolves a fresh tenant client per call and bounds every call by the
//! configured request timeout.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use kaas_common::{ProjectRole, ResourceQuota, ResourceUsage};
use tracing::debug;

use super::client::K8sClient;
use super::cluster_resources::{hierarchy, namespaces, quotas, rbac};
use super::credentials::TenantClientResolver;
use super::error::{K8sError, K8sResult};
use super::types::NamespaceInfo;
use super::ClusterProjection;

/// Projects project state into per-workspace virtual clusters
#[derive(Clone)]
pub struct VClusterAdapter {
    resolver: TenantClientResolver,
    timeout: Duration,
}

impl VClusterAdapter {
    pub fn new(resolver: TenantClientResolver) -> Self {
        let timeout = resolver.config().request_timeout();
        Self { resolver, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the tenant client and run `op` against it within the timeout
    async fn run<T, F, Fut>(&self, operation: &str, workspace_id: &str, op: F) -> K8sResult<T>
    where
        F: FnOnce(K8sClient) -> Fut,
        Fut: Future<Output = K8sResult<T>>,
    {
        debug!(operation, workspace_id, "Cluster call");

        let call = async {
            let client = self.resolver.resolve(workspace_id).await?;
            op(client).await
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| K8sError::Timeout {
                operation: operation.to_string(),
                after: self.timeout,
            })?
    }
}

#[async_trait::async_trait]
impl ClusterProjection for VClusterAdapter {
    async fn create_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> K8sResult<NamespaceInfo> {
        self.run("create_namespace", workspace_id, |client| async move {
            namespaces::create_namespace(&client, name, labels).await
        })
        .await
    }

    async fn delete_namespace(&self, workspace_id: &str, name: &str) -> K8sResult<()> {
        self.run("delete_namespace", workspace_id, |client| async move {
            namespaces::delete_namespace(&client, name).await
        })
        .await
    }

    async fn get_namespace(&self, workspace_id: &str, name: &str) -> K8sResult<Option<NamespaceInfo>> {
        self.run("get_namespace", workspace_id, |client| async move {
            namespaces::get_namespace(&client, name).await
        })
        .await
    }

    async fn list_namespaces(
        &self,
        workspace_id: &str,
        label_selector: Option<&str>,
    ) -> K8sResult<Vec<NamespaceInfo>> {
        self.run("list_namespaces", workspace_id, |client| async move {
            namespaces::list_namespaces(&client, label_selector).await
        })
        .await
    }

    async fn apply_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()> {
        self.run("apply_resource_quota", workspace_id, |client| async move {
            quotas::apply_resource_quota(&client, namespace, quota).await
        })
        .await
    }

    async fn create_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()> {
        self.run("create_resource_quota", workspace_id, |client| async move {
            quotas::create_resource_quota(&client, namespace, quota).await
        })
        .await
    }

    async fn update_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()> {
        self.run("update_resource_quota", workspace_id, |client| async move {
            quotas::update_resource_quota(&client, namespace, quota).await
        })
        .await
    }

    async fn get_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
    ) -> K8sResult<Option<ResourceQuota>> {
        self.run("get_resource_quota", workspace_id, |client| async move {
            quotas::get_resource_quota(&client, namespace).await
        })
        .await
    }

    async fn delete_resource_quota(&self, workspace_id: &str, namespace: &str) -> K8sResult<()> {
        self.run("delete_resource_quota", workspace_id, |client| async move {
            quotas::delete_resource_quota(&client, namespace).await
        })
        .await
    }

    async fn get_namespace_usage(&self, workspace_id: &str, namespace: &str) -> K8sResult<ResourceUsage> {
        self.run("get_namespace_usage", workspace_id, |client| async move {
            quotas::get_namespace_usage(&client, namespace).await
        })
        .await
    }

    async fn apply_rbac(
        &self,
        workspace_id: &str,
        namespace: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> K8sResult<()> {
        self.run("apply_rbac", workspace_id, |client| async move {
            rbac::apply_rbac(&client, namespace, user_id, role).await
        })
        .await
    }

    async fn remove_rbac(&self, workspace_id: &str, namespace: &str, user_id: &str) -> K8sResult<()> {
        self.run("remove_rbac", workspace_id, |client| async move {
            rbac::remove_rbac(&client, namespace, user_id).await
        })
        .await
    }

    async fn configure_hnc(
        &self,
        workspace_id: &str,
        parent_namespace: &str,
        child_namespace: &str,
    ) -> K8sResult<()> {
        self.run("configure_hnc", workspace_id, |client| async move {
            hierarchy::configure_hnc(&client, parent_namespace, child_namespace).await
        })
        .await
    }
}
