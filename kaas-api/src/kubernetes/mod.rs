//! Cluster projection for tenant projects
//!
//! Provides the live side of project orchestration:
//! - Per-workspace client resolution from credential secrets
//! - Namespace lifecycle
//! - Resource quotas and usage
//! - Member access bindings
//! - Hierarchical namespace anchors for sub-projects

pub mod adapter;
pub mod client;
pub mod cluster_resources;
pub mod credentials;
pub mod error;
pub mod types;

use std::collections::BTreeMap;

use kaas_common::{ProjectRole, ResourceQuota, ResourceUsage};

pub use adapter::VClusterAdapter;
pub use error::{K8sError, K8sResult};
pub use types::NamespaceInfo;

/// Operations the project service performs against a workspace's isolated cluster
///
/// Every call targets exactly one workspace. Writes are idempotent so a
/// retried call converges on the same live state.
#[async_trait::async_trait]
pub trait ClusterProjection: Send + Sync {
    async fn create_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> K8sResult<NamespaceInfo>;

    /// Absent namespaces count as deleted
    async fn delete_namespace(&self, workspace_id: &str, name: &str) -> K8sResult<()>;

    async fn get_namespace(&self, workspace_id: &str, name: &str) -> K8sResult<Option<NamespaceInfo>>;

    async fn list_namespaces(
        &self,
        workspace_id: &str,
        label_selector: Option<&str>,
    ) -> K8sResult<Vec<NamespaceInfo>>;

    /// Create or update the namespace quota
    async fn apply_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()>;

    /// Falls through to update when the quota exists
    async fn create_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()>;

    /// Falls back to create when the quota is absent
    async fn update_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()>;

    async fn get_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
    ) -> K8sResult<Option<ResourceQuota>>;

    async fn delete_resource_quota(&self, workspace_id: &str, namespace: &str) -> K8sResult<()>;

    /// Zeroed when the namespace has no quota object
    async fn get_namespace_usage(&self, workspace_id: &str, namespace: &str) -> K8sResult<ResourceUsage>;

    async fn apply_rbac(
        &self,
        workspace_id: &str,
        namespace: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> K8sResult<()>;

    async fn remove_rbac(&self, workspace_id: &str, namespace: &str, user_id: &str) -> K8sResult<()>;

    async fn configure_hnc(
        &self,
        workspace_id: &str,
        parent_namespace: &str,
        child_namespace: &str,
    ) -> K8sResult<()>;
}
