//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kaas_api::db::{self, Database};
use kaas_api::kubernetes::types::{foreign_owner, managed_labels};
use kaas_api::kubernetes::{ClusterProjection, K8sError, K8sResult, NamespaceInfo};
use kaas_api::ProjectService;
use kaas_common::{CreateProjectRequest, ProjectRole, ResourceQuota, ResourceUsage, User};

pub const WORKSPACE: &str = "ws-1";

type NsKey = (String, String);

#[derive(Default)]
struct ClusterState {
    namespaces: BTreeMap<NsKey, NamespaceInfo>,
    quotas: HashMap<NsKey, ResourceQuota>,
    usage: HashMap<NsKey, ResourceUsage>,
    /// (workspace, namespace, user) -> cluster role
    bindings: HashMap<(String, String, String), String>,
    anchors: Vec<(String, String, String)>,
    deleted_namespaces: Vec<String>,
}

/// In-memory cluster with failure injection and call recording
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
    pub fail_namespaces: AtomicBool,
    pub fail_quotas: AtomicBool,
    pub fail_rbac: AtomicBool,
    pub fail_hnc: AtomicBool,
    pub fail_reads: AtomicBool,
    pub quota_creates: AtomicUsize,
    pub quota_updates: AtomicUsize,
    pub binding_recreates: AtomicUsize,
}

fn key(workspace_id: &str, name: &str) -> NsKey {
    (workspace_id.to_string(), name.to_string())
}

fn injected(flag: &AtomicBool, operation: &str) -> K8sResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(K8sError::Internal(format!("injected {} failure", operation)))
    } else {
        Ok(())
    }
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn has_namespace(&self, workspace_id: &str, name: &str) -> bool {
        self.state.lock().unwrap().namespaces.contains_key(&key(workspace_id, name))
    }

    /// Put a namespace on the cluster that the metadata store does not know about
    pub fn seed_namespace(&self, workspace_id: &str, name: &str, owner_project_id: &str) {
        let info = NamespaceInfo {
            name: name.to_string(),
            status: "Active".to_string(),
            labels: managed_labels(workspace_id, owner_project_id),
            created_at: Some(chrono::Utc::now()),
        };
        self.state.lock().unwrap().namespaces.insert(key(workspace_id, name), info);
    }

    pub fn namespace_labels(&self, workspace_id: &str, name: &str) -> BTreeMap<String, String> {
        self.state.lock().unwrap().namespaces[&key(workspace_id, name)].labels.clone()
    }

    pub fn quota(&self, workspace_id: &str, namespace: &str) -> Option<ResourceQuota> {
        self.state.lock().unwrap().quotas.get(&key(workspace_id, namespace)).cloned()
    }

    pub fn set_usage(&self, workspace_id: &str, namespace: &str, usage: ResourceUsage) {
        self.state.lock().unwrap().usage.insert(key(workspace_id, namespace), usage);
    }

    pub fn binding(&self, workspace_id: &str, namespace: &str, user_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .bindings
            .get(&(workspace_id.to_string(), namespace.to_string(), user_id.to_string()))
            .cloned()
    }

    pub fn anchors(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().anchors.clone()
    }

    pub fn deleted_namespaces(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_namespaces.clone()
    }

    fn write_quota(&self, workspace_id: &str, namespace: &str, quota: &ResourceQuota) {
        let mut state = self.state.lock().unwrap();
        let previous = state.quotas.insert(key(workspace_id, namespace), quota.clone());
        if previous.is_some() {
            self.quota_updates.fetch_add(1, Ordering::SeqCst);
        } else {
            self.quota_creates.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ClusterProjection for FakeCluster {
    async fn create_namespace(
        &self,
        workspace_id: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> K8sResult<NamespaceInfo> {
        injected(&self.fail_namespaces, "create_namespace")?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.namespaces.get(&key(workspace_id, name)) {
            if let Some(owner) = foreign_owner(existing, labels) {
                return Err(K8sError::NamespaceOwnedElsewhere {
                    name: name.to_string(),
                    owner: owner.to_string(),
                });
            }
            return Ok(existing.clone());
        }
        let info = NamespaceInfo {
            name: name.to_string(),
            status: "Active".to_string(),
            labels: labels.clone(),
            created_at: Some(chrono::Utc::now()),
        };
        state.namespaces.insert(key(workspace_id, name), info.clone());
        Ok(info)
    }

    async fn delete_namespace(&self, workspace_id: &str, name: &str) -> K8sResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted_namespaces.push(name.to_string());
        injected(&self.fail_namespaces, "delete_namespace")?;
        state.namespaces.remove(&key(workspace_id, name));
        state.quotas.remove(&key(workspace_id, name));
        Ok(())
    }

    async fn get_namespace(&self, workspace_id: &str, name: &str) -> K8sResult<Option<NamespaceInfo>> {
        injected(&self.fail_reads, "get_namespace")?;
        Ok(self.state.lock().unwrap().namespaces.get(&key(workspace_id, name)).cloned())
    }

    async fn list_namespaces(
        &self,
        workspace_id: &str,
        _label_selector: Option<&str>,
    ) -> K8sResult<Vec<NamespaceInfo>> {
        injected(&self.fail_reads, "list_namespaces")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .namespaces
            .iter()
            .filter(|((ws, _), _)| ws == workspace_id)
            .map(|(_, info)| info.clone())
            .collect())
    }

    async fn apply_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()> {
        injected(&self.fail_quotas, "apply_resource_quota")?;
        self.write_quota(workspace_id, namespace, quota);
        Ok(())
    }

    async fn create_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()> {
        self.apply_resource_quota(workspace_id, namespace, quota).await
    }

    async fn update_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
        quota: &ResourceQuota,
    ) -> K8sResult<()> {
        self.apply_resource_quota(workspace_id, namespace, quota).await
    }

    async fn get_resource_quota(
        &self,
        workspace_id: &str,
        namespace: &str,
    ) -> K8sResult<Option<ResourceQuota>> {
        injected(&self.fail_reads, "get_resource_quota")?;
        Ok(self.quota(workspace_id, namespace))
    }

    async fn delete_resource_quota(&self, workspace_id: &str, namespace: &str) -> K8sResult<()> {
        injected(&self.fail_quotas, "delete_resource_quota")?;
        self.state.lock().unwrap().quotas.remove(&key(workspace_id, namespace));
        Ok(())
    }

    async fn get_namespace_usage(&self, workspace_id: &str, namespace: &str) -> K8sResult<ResourceUsage> {
        injected(&self.fail_reads, "get_namespace_usage")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .usage
            .get(&key(workspace_id, namespace))
            .cloned()
            .unwrap_or_else(ResourceUsage::zero))
    }

    async fn apply_rbac(
        &self,
        workspace_id: &str,
        namespace: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> K8sResult<()> {
        injected(&self.fail_rbac, "apply_rbac")?;
        let previous = self.state.lock().unwrap().bindings.insert(
            (workspace_id.to_string(), namespace.to_string(), user_id.to_string()),
            role.cluster_role().to_string(),
        );
        if previous.is_some_and(|p| p != role.cluster_role()) {
            self.binding_recreates.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn remove_rbac(&self, workspace_id: &str, namespace: &str, user_id: &str) -> K8sResult<()> {
        injected(&self.fail_rbac, "remove_rbac")?;
        self.state.lock().unwrap().bindings.remove(&(
            workspace_id.to_string(),
            namespace.to_string(),
            user_id.to_string(),
        ));
        Ok(())
    }

    async fn configure_hnc(
        &self,
        workspace_id: &str,
        parent_namespace: &str,
        child_namespace: &str,
    ) -> K8sResult<()> {
        injected(&self.fail_hnc, "configure_hnc")?;
        let anchor = (
            workspace_id.to_string(),
            parent_namespace.to_string(),
            child_namespace.to_string(),
        );
        let mut state = self.state.lock().unwrap();
        if !state.anchors.contains(&anchor) {
            state.anchors.push(anchor);
        }
        Ok(())
    }
}

/// Single-connection in-memory database with migrations applied
pub async fn memory_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    let db = Database::from_pool(pool);
    db.migrate().await.expect("Failed to run migrations");
    db
}

/// Service over an in-memory store and a fresh fake cluster
pub async fn setup() -> (ProjectService, Arc<FakeCluster>, Database) {
    let db = memory_db().await;
    let cluster = FakeCluster::new();
    let service = ProjectService::new(db.clone(), cluster.clone());
    (service, cluster, db)
}

pub async fn seed_user(db: &Database, id: &str, email: &str, name: &str) -> User {
    let user = User {
        id: id.to_string(),
        email: email.to_string(),
        display_name: name.to_string(),
    };
    db::users::upsert(db.pool(), &user).await.expect("Failed to seed user");
    user
}

pub fn project_request(name: &str) -> CreateProjectRequest {
    CreateProjectRequest {
        name: name.to_string(),
        workspace_id: WORKSPACE.to_string(),
        created_by: "owner".to_string(),
        ..Default::default()
    }
}
