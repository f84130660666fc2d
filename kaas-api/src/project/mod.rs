//! Tenant project orchestration
//!
//! Metadata is written first; the live cluster is then brought in line on a
//! best-effort basis. Live failures on writes are logged as drift and never
//! undo the metadata change. Pure live reads propagate cluster errors.

mod access;
mod activity;
mod members;
mod namespaces;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use kaas_common::{
    ActivityType, CreateProjectRequest, Error, NewActivity, Project, ProjectFilter,
    ProjectHierarchy, ProjectList, ProjectStats, ProjectStatus, ResourceQuota, ResourceUsage,
    Result, UpdateProjectRequest, normalize_page, SETTINGS_HIERARCHY, SETTINGS_RESOURCE_QUOTA,
};

use crate::activity::ActivityLog;
use crate::db::{self, Database};
use crate::kubernetes::types::managed_labels;
use crate::kubernetes::ClusterProjection;
use crate::validation;
use crate::{log_cluster_drift, log_project_operation};

/// Project lifecycle, quota, membership and audit operations
#[derive(Clone)]
pub struct ProjectService {
    db: Database,
    activities: ActivityLog,
    cluster: Arc<dyn ClusterProjection>,
}

impl ProjectService {
    pub fn new(db: Database, cluster: Arc<dyn ClusterProjection>) -> Self {
        let activities = ActivityLog::new(db.pool().clone());
        Self {
            db,
            activities,
            cluster,
        }
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.activities
    }

    // ========================================================================
    // Project lifecycle
    // ========================================================================

    /// Create a project and its namespace
    ///
    /// The project is active on return even when the namespace could not be
    /// created; `namespace_name` is then empty.
    pub async fn create_project(&self, req: CreateProjectRequest) -> Result<Project> {
        let actor = req.created_by.clone();
        let project = self.provision_project(req, None).await?;

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::ProjectCreated,
                format!("Project '{}' created", project.name),
                actor,
            )
            .with_metadata(json!({
                "name": project.name,
                "workspace_id": project.workspace_id,
                "namespace": project.namespace_name,
            })),
        )
        .await;

        Ok(project)
    }

    /// Create a project below `parent_id` in the parent's workspace
    pub async fn create_sub_project(&self, parent_id: &str, mut req: CreateProjectRequest) -> Result<Project> {
        let parent = db::projects::find(self.db.pool(), parent_id)
            .await?
            .ok_or_else(|| Error::NotFound("parent project not found".to_string()))?;

        req.workspace_id = parent.workspace_id.clone();
        req.settings.insert(
            SETTINGS_HIERARCHY.to_string(),
            json!({
                "parent_id": parent.id,
                "parent_namespace": parent.namespace_name,
            }),
        );
        let actor = req.created_by.clone();

        let child = self.provision_project(req, Some(&parent)).await?;

        if parent.has_namespace() && child.has_namespace() {
            if let Err(e) = self
                .cluster
                .configure_hnc(&parent.workspace_id, &parent.namespace_name, &child.namespace_name)
                .await
            {
                log_cluster_drift!("configure_hnc", child.id, e);
            }
        } else {
            warn!(
                parent_id = %parent.id,
                project_id = %child.id,
                "Skipping hierarchy anchor: parent or child has no namespace"
            );
        }

        self.record(
            NewActivity::new(
                &child.id,
                ActivityType::ProjectCreated,
                format!("Project '{}' created", child.name),
                actor.clone(),
            )
            .with_metadata(json!({
                "name": child.name,
                "workspace_id": child.workspace_id,
                "namespace": child.namespace_name,
                "parent_id": parent.id,
            })),
        )
        .await;

        self.record(
            NewActivity::new(
                &parent.id,
                ActivityType::SubprojectCreated,
                format!("Sub-project '{}' created", child.name),
                actor,
            )
            .with_metadata(json!({
                "sub_project_id": child.id,
                "sub_project_name": child.name,
            })),
        )
        .await;

        Ok(child)
    }

    /// Shared creation path: validate, persist, project live, activate
    async fn provision_project(&self, req: CreateProjectRequest, parent: Option<&Project>) -> Result<Project> {
        validation::validate_project_name(&req.name)?;
        if req.workspace_id.is_empty() {
            return Err(Error::Validation("workspace id is required".to_string()));
        }
        validation::validate_display_name(&req.display_name)?;
        validation::validate_description(&req.description)?;
        if let Some(quota) = &req.resource_quota {
            validation::validate_resource_quota(quota)?;
        }

        if db::projects::find_by_name(self.db.pool(), &req.workspace_id, &req.name)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "project '{}' already exists in workspace '{}'",
                req.name, req.workspace_id
            )));
        }
        if db::namespaces::name_in_use(self.db.pool(), &req.workspace_id, &req.name).await? {
            return Err(Error::Conflict(format!(
                "namespace '{}' is already in use in workspace '{}'",
                req.name, req.workspace_id
            )));
        }

        let now = Utc::now();
        let mut project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: if req.display_name.is_empty() {
                req.name.clone()
            } else {
                req.display_name
            },
            name: req.name,
            description: req.description,
            workspace_id: req.workspace_id,
            parent_id: parent.map(|p| p.id.clone()),
            namespace_name: String::new(),
            status: ProjectStatus::Creating,
            settings: req.settings,
            resource_quota: None,
            namespace_status: None,
            resource_usage: None,
            created_at: now,
            updated_at: now,
        };
        db::projects::insert(self.db.pool(), &project).await?;
        log_project_operation!("create", project.id, workspace_id = project.workspace_id, project_name = project.name);

        let labels = managed_labels(&project.workspace_id, &project.id);
        match self
            .cluster
            .create_namespace(&project.workspace_id, &project.name, &labels)
            .await
        {
            Ok(info) => {
                debug!(project_id = %project.id, namespace = %info.name, "Namespace created");
                project.namespace_name = info.name;
                project.namespace_status = Some(info.status).filter(|s| !s.is_empty());
            }
            Err(e) => log_cluster_drift!("create_namespace", project.id, e),
        }

        if let Some(quota) = req.resource_quota {
            if project.has_namespace() && !quota.is_empty() {
                if let Err(e) = self
                    .cluster
                    .apply_resource_quota(&project.workspace_id, &project.namespace_name, &quota)
                    .await
                {
                    log_cluster_drift!("apply_resource_quota", project.id, e);
                }
            }
            project
                .settings
                .insert(SETTINGS_RESOURCE_QUOTA.to_string(), serde_json::to_value(&quota)?);
            project.resource_quota = Some(quota);
        }

        project.status = ProjectStatus::Active;
        project.updated_at = Utc::now();
        db::projects::update(self.db.pool(), &project).await?;

        Ok(project)
    }

    /// Load a project, enriched with live namespace status and usage when reachable
    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        let mut project = db::projects::get(self.db.pool(), project_id).await?;

        if !project.has_namespace() {
            return Ok(project);
        }

        match self
            .cluster
            .get_namespace(&project.workspace_id, &project.namespace_name)
            .await
        {
            Ok(Some(info)) => project.namespace_status = Some(info.status),
            Ok(None) => warn!(
                project_id = %project.id,
                namespace = %project.namespace_name,
                "Bound namespace is missing from the cluster"
            ),
            Err(e) => warn!(project_id = %project.id, error = %e, "Failed to get namespace status"),
        }

        match self
            .cluster
            .get_namespace_usage(&project.workspace_id, &project.namespace_name)
            .await
        {
            Ok(usage) => project.resource_usage = Some(usage),
            Err(e) => warn!(project_id = %project.id, error = %e, "Failed to get namespace usage"),
        }

        Ok(project)
    }

    /// Paginated listing with live namespace status per row
    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<ProjectList> {
        let (page, page_size) = normalize_page(filter.page, filter.page_size);
        let (mut projects, total) = db::projects::list(self.db.pool(), filter).await?;

        for project in projects.iter_mut().filter(|p| p.has_namespace()) {
            match self
                .cluster
                .get_namespace(&project.workspace_id, &project.namespace_name)
                .await
            {
                Ok(info) => project.namespace_status = info.map(|i| i.status),
                Err(e) => {
                    warn!(project_id = %project.id, error = %e, "Failed to get namespace status")
                }
            }
        }

        Ok(ProjectList {
            projects,
            total,
            page,
            page_size,
        })
    }

    /// Metadata-only update; request settings overwrite stored keys, others are kept
    pub async fn update_project(&self, project_id: &str, req: UpdateProjectRequest) -> Result<Project> {
        let mut project = db::projects::get(self.db.pool(), project_id).await?;
        let mut changed = Vec::new();

        if let Some(display_name) = req.display_name {
            validation::validate_display_name(&display_name)?;
            project.display_name = display_name;
            changed.push("display_name".to_string());
        }
        if let Some(description) = req.description {
            validation::validate_description(&description)?;
            project.description = description;
            changed.push("description".to_string());
        }
        for (key, value) in req.settings {
            changed.push(format!("settings.{}", key));
            project.settings.insert(key, value);
        }

        project.updated_at = Utc::now();
        db::projects::update(self.db.pool(), &project).await?;
        log_project_operation!("update", project.id);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::ProjectUpdated,
                format!("Project '{}' updated", project.name),
                req.updated_by,
            )
            .with_metadata(json!({ "changed": changed })),
        )
        .await;

        Ok(project)
    }

    /// Delete a project, its namespace and its memberships
    ///
    /// Refused while sub-projects exist.
    pub async fn delete_project(&self, project_id: &str, actor_id: &str) -> Result<()> {
        let project = db::projects::get(self.db.pool(), project_id).await?;

        let children = db::projects::count_children(self.db.pool(), project_id).await?;
        if children > 0 {
            return Err(Error::Conflict(format!(
                "project '{}' still has {} sub-project(s)",
                project.name, children
            )));
        }

        db::projects::update_status(self.db.pool(), project_id, ProjectStatus::Terminating).await?;

        let secondary = db::namespaces::list_by_project(self.db.pool(), project_id).await?;
        let live_namespaces = std::iter::once(project.namespace_name.as_str())
            .filter(|n| !n.is_empty())
            .chain(secondary.iter().map(|ns| ns.name.as_str()));
        for namespace in live_namespaces {
            if let Err(e) = self.cluster.delete_namespace(&project.workspace_id, namespace).await {
                log_cluster_drift!("delete_namespace", project.id, e);
            }
        }

        let (members, namespaces) = db::projects::delete_with_dependents(self.db.pool(), project_id).await?;
        log_project_operation!("delete", project.id, members = members, namespaces = namespaces);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::ProjectDeleted,
                format!("Project '{}' deleted", project.name),
                actor_id,
            )
            .with_metadata(json!({
                "name": project.name,
                "workspace_id": project.workspace_id,
                "namespace": project.namespace_name,
            })),
        )
        .await;

        Ok(())
    }

    /// Tree of projects rooted at `project_id`
    pub async fn get_project_hierarchy(&self, project_id: &str) -> Result<ProjectHierarchy> {
        let root = db::projects::get(self.db.pool(), project_id).await?;
        let mut visited = HashSet::from([root.id.clone()]);
        self.build_hierarchy(root, &mut visited).await
    }

    fn build_hierarchy<'a>(
        &'a self,
        project: Project,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<ProjectHierarchy>> {
        Box::pin(async move {
            let mut children = Vec::new();
            for child in db::projects::children(self.db.pool(), &project.id).await? {
                if !visited.insert(child.id.clone()) {
                    warn!(project_id = %child.id, "Project already visited in hierarchy, skipping");
                    continue;
                }
                children.push(self.build_hierarchy(child, visited).await?);
            }
            Ok(ProjectHierarchy { project, children })
        })
    }

    // ========================================================================
    // Quotas and usage
    // ========================================================================

    /// Set the project's quota and push it to the live namespace
    pub async fn apply_resource_quota(
        &self,
        project_id: &str,
        quota: ResourceQuota,
        actor_id: &str,
    ) -> Result<Project> {
        validation::validate_resource_quota(&quota)?;
        let mut project = db::projects::get(self.db.pool(), project_id).await?;

        if project.has_namespace() {
            if let Err(e) = self
                .cluster
                .apply_resource_quota(&project.workspace_id, &project.namespace_name, &quota)
                .await
            {
                log_cluster_drift!("apply_resource_quota", project.id, e);
            }
        } else {
            warn!(project_id = %project.id, "Project has no namespace; quota stored only");
        }

        let previous = project.resource_quota.take();
        project
            .settings
            .insert(SETTINGS_RESOURCE_QUOTA.to_string(), serde_json::to_value(&quota)?);
        project.resource_quota = Some(quota.clone());
        project.updated_at = Utc::now();
        db::projects::update(self.db.pool(), &project).await?;
        log_project_operation!("apply_quota", project.id);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::QuotaChanged,
                "Resource quota updated",
                actor_id,
            )
            .with_metadata(json!({ "previous": previous, "quota": quota })),
        )
        .await;

        Ok(project)
    }

    /// Live quota consumption of the project's namespace
    pub async fn get_resource_usage(&self, project_id: &str) -> Result<ResourceUsage> {
        let project = db::projects::get(self.db.pool(), project_id).await?;
        if !project.has_namespace() {
            return Err(Error::NotFound(format!(
                "project {} has no namespace",
                project.id
            )));
        }

        Ok(self
            .cluster
            .get_namespace_usage(&project.workspace_id, &project.namespace_name)
            .await?)
    }

    // ========================================================================
    // Stats
    // ========================================================================

    pub async fn get_project_stats(&self, project_id: &str) -> Result<ProjectStats> {
        let project = db::projects::get(self.db.pool(), project_id).await?;
        let pool = self.db.pool();

        let secondary = db::namespaces::count_by_project(pool, project_id).await?;
        let member_count = db::members::count_by_project(pool, project_id).await?;
        let sub_project_count = db::projects::count_children(pool, project_id).await?;
        let last_activity = self.activities.last_activity(project_id).await?;

        let resource_usage = if project.has_namespace() {
            self.cluster
                .get_namespace_usage(&project.workspace_id, &project.namespace_name)
                .await
                .map_err(|e| warn!(project_id, error = %e, "Failed to get namespace usage"))
                .ok()
        } else {
            None
        };

        Ok(ProjectStats {
            project_id: project.id,
            namespace_count: secondary + i64::from(!project.namespace_name.is_empty()),
            member_count,
            sub_project_count,
            resource_usage,
            last_activity,
        })
    }

    /// Append an activity; failures are logged and swallowed
    async fn record(&self, activity: NewActivity) {
        if let Err(e) = self.activities.record(&activity).await {
            error!(
                project_id = %activity.project_id,
                activity_type = %activity.activity_type,
                error = %e,
                "Failed to record activity"
            );
        } else {
            info!(
                project_id = %activity.project_id,
                activity_type = %activity.activity_type,
                "Activity recorded"
            );
        }
    }
}
