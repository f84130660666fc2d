//! Secondary namespaces owned by a project

use chrono::Utc;
use serde_json::json;
use tracing::warn;

use kaas_common::{
    ActivityType, CreateNamespaceRequest, Error, Namespace, NamespaceList, NewActivity, Project,
    ResourceQuota, ResourceUsage, Result, UpdateNamespaceRequest,
};

use super::ProjectService;
use crate::db;
use crate::kubernetes::types::managed_labels;
use crate::validation;
use crate::{log_cluster_drift, log_project_operation};

const STATUS_ACTIVE: &str = "active";
const STATUS_PENDING: &str = "pending";

impl ProjectService {
    pub async fn create_namespace(
        &self,
        project_id: &str,
        req: CreateNamespaceRequest,
        actor_id: &str,
    ) -> Result<Namespace> {
        validation::validate_namespace_name(&req.name)?;
        validation::validate_description(&req.description)?;
        if let Some(quota) = &req.resource_quota {
            validation::validate_resource_quota(quota)?;
        }

        let project = db::projects::get(self.db.pool(), project_id).await?;

        if db::namespaces::find_by_name(self.db.pool(), project_id, &req.name)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "namespace '{}' already exists in project",
                req.name
            )));
        }
        if db::namespaces::name_in_use(self.db.pool(), &project.workspace_id, &req.name).await? {
            return Err(Error::Conflict(format!(
                "namespace '{}' is already in use in workspace '{}'",
                req.name, project.workspace_id
            )));
        }

        let now = Utc::now();
        let mut namespace = Namespace {
            id: uuid::Uuid::new_v4().to_string(),
            name: req.name,
            project_id: project.id.clone(),
            description: req.description,
            status: STATUS_PENDING.to_string(),
            resource_quota: req.resource_quota,
            resource_usage: None,
            created_at: now,
            updated_at: now,
        };
        db::namespaces::insert(self.db.pool(), &namespace).await?;

        let mut labels = managed_labels(&project.workspace_id, &project.id);
        labels.extend(req.labels);

        match self
            .cluster
            .create_namespace(&project.workspace_id, &namespace.name, &labels)
            .await
        {
            Ok(_) => {
                namespace.status = STATUS_ACTIVE.to_string();
                if let Some(quota) = namespace.resource_quota.as_ref().filter(|q| !q.is_empty()) {
                    self.project_quota(&project, &namespace.name, quota).await;
                }
            }
            Err(e) => log_cluster_drift!("create_namespace", project.id, e),
        }

        namespace.updated_at = Utc::now();
        db::namespaces::update(self.db.pool(), &namespace).await?;
        log_project_operation!("create_namespace", project.id, namespace = namespace.name);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::NamespaceCreated,
                format!("Namespace '{}' created", namespace.name),
                actor_id,
            )
            .with_metadata(json!({ "namespace_id": namespace.id, "namespace": namespace.name })),
        )
        .await;

        Ok(namespace)
    }

    /// Load a namespace of the project, with live usage when reachable
    pub async fn get_namespace(&self, project_id: &str, namespace_id: &str) -> Result<Namespace> {
        let (project, mut namespace) = self.owned_namespace(project_id, namespace_id).await?;

        match self
            .cluster
            .get_namespace_usage(&project.workspace_id, &namespace.name)
            .await
        {
            Ok(usage) => namespace.resource_usage = Some(usage),
            Err(e) => warn!(
                project_id,
                namespace = %namespace.name,
                error = %e,
                "Failed to get namespace usage"
            ),
        }

        Ok(namespace)
    }

    pub async fn list_namespaces(&self, project_id: &str) -> Result<NamespaceList> {
        db::projects::get(self.db.pool(), project_id).await?;
        let namespaces = db::namespaces::list_by_project(self.db.pool(), project_id).await?;
        let total = namespaces.len() as i64;
        Ok(NamespaceList { namespaces, total })
    }

    pub async fn update_namespace(
        &self,
        project_id: &str,
        namespace_id: &str,
        req: UpdateNamespaceRequest,
        actor_id: &str,
    ) -> Result<Namespace> {
        let (project, mut namespace) = self.owned_namespace(project_id, namespace_id).await?;

        if let Some(description) = req.description {
            validation::validate_description(&description)?;
            namespace.description = description;
        }
        if let Some(quota) = req.resource_quota {
            validation::validate_resource_quota(&quota)?;
            self.project_quota(&project, &namespace.name, &quota).await;
            namespace.resource_quota = Some(quota);
        }

        namespace.updated_at = Utc::now();
        db::namespaces::update(self.db.pool(), &namespace).await?;
        log_project_operation!("update_namespace", project.id, namespace = namespace.name);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::NamespaceUpdated,
                format!("Namespace '{}' updated", namespace.name),
                actor_id,
            )
            .with_metadata(json!({
                "namespace_id": namespace.id,
                "resource_quota": namespace.resource_quota,
            })),
        )
        .await;

        Ok(namespace)
    }

    pub async fn delete_namespace(&self, project_id: &str, namespace_id: &str, actor_id: &str) -> Result<()> {
        let (project, namespace) = self.owned_namespace(project_id, namespace_id).await?;

        if let Err(e) = self
            .cluster
            .delete_namespace(&project.workspace_id, &namespace.name)
            .await
        {
            log_cluster_drift!("delete_namespace", project.id, e);
        }

        db::namespaces::delete(self.db.pool(), &namespace.id).await?;
        log_project_operation!("delete_namespace", project.id, namespace = namespace.name);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::NamespaceDeleted,
                format!("Namespace '{}' deleted", namespace.name),
                actor_id,
            )
            .with_metadata(json!({ "namespace_id": namespace.id, "namespace": namespace.name })),
        )
        .await;

        Ok(())
    }

    /// Live quota consumption of a secondary namespace
    pub async fn get_namespace_usage(&self, project_id: &str, namespace_id: &str) -> Result<ResourceUsage> {
        let (project, namespace) = self.owned_namespace(project_id, namespace_id).await?;

        Ok(self
            .cluster
            .get_namespace_usage(&project.workspace_id, &namespace.name)
            .await?)
    }

    /// Load a project and one of its namespaces, rejecting foreign namespaces
    async fn owned_namespace(&self, project_id: &str, namespace_id: &str) -> Result<(Project, Namespace)> {
        let project = db::projects::get(self.db.pool(), project_id).await?;
        let namespace = db::namespaces::get(self.db.pool(), namespace_id).await?;

        if namespace.project_id != project.id {
            return Err(Error::Mismatch("namespace does not belong to project".to_string()));
        }

        Ok((project, namespace))
    }

    async fn project_quota(&self, project: &Project, namespace: &str, quota: &ResourceQuota) {
        if let Err(e) = self
            .cluster
            .apply_resource_quota(&project.workspace_id, namespace, quota)
            .await
        {
            log_cluster_drift!("apply_resource_quota", project.id, e);
        }
    }
}
