//! Project membership and the access bindings that mirror it

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use kaas_common::{
    ActivityType, AddMemberRequest, Error, MemberList, MemberStatus, NewActivity, Project,
    ProjectMember, ProjectRole, Result, UpdateMemberRoleRequest,
};

use super::ProjectService;
use crate::db;
use crate::validation;
use crate::{log_cluster_drift, log_project_operation};

impl ProjectService {
    /// Add a user to the project by email
    ///
    /// The membership is kept even when the access binding cannot be created.
    pub async fn add_member(&self, project_id: &str, actor_id: &str, req: AddMemberRequest) -> Result<ProjectMember> {
        let role = validation::validate_role(&req.role)?;
        validation::validate_email(&req.user_email)?;

        let project = db::projects::get(self.db.pool(), project_id).await?;
        let user = db::users::find_by_email(self.db.pool(), &req.user_email)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user '{}' not found", req.user_email)))?;

        if db::members::find_by_user(self.db.pool(), project_id, &user.id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict("user is already a project member".to_string()));
        }

        let member = ProjectMember {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            user_id: user.id,
            user_email: user.email,
            user_name: user.display_name,
            role,
            status: MemberStatus::Active,
            added_by: actor_id.to_string(),
            added_at: Utc::now(),
        };
        db::members::insert(self.db.pool(), &member).await?;
        log_project_operation!("add_member", project.id, user_id = member.user_id, role = role);

        self.project_binding(&project, &member.user_id, role).await;

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::MemberAdded,
                format!("Added {} as {}", member.user_email, role),
                actor_id,
            )
            .with_metadata(json!({
                "member_id": member.id,
                "user_id": member.user_id,
                "role": role,
            })),
        )
        .await;

        Ok(member)
    }

    pub async fn remove_member(&self, project_id: &str, member_id: &str, actor_id: &str) -> Result<()> {
        let (project, member) = self.owned_member(project_id, member_id).await?;

        if project.has_namespace() {
            if let Err(e) = self
                .cluster
                .remove_rbac(&project.workspace_id, &project.namespace_name, &member.user_id)
                .await
            {
                log_cluster_drift!("remove_rbac", project.id, e);
            }
        }

        db::members::delete(self.db.pool(), &member.id).await?;
        log_project_operation!("remove_member", project.id, user_id = member.user_id);

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::MemberRemoved,
                format!("Removed {}", member.user_email),
                actor_id,
            )
            .with_metadata(json!({ "member_id": member.id, "user_id": member.user_id })),
        )
        .await;

        Ok(())
    }

    pub async fn update_member_role(
        &self,
        project_id: &str,
        member_id: &str,
        actor_id: &str,
        req: UpdateMemberRoleRequest,
    ) -> Result<ProjectMember> {
        let role = validation::validate_role(&req.role)?;
        let (project, mut member) = self.owned_member(project_id, member_id).await?;

        let previous = member.role;
        db::members::update_role(self.db.pool(), &member.id, role).await?;
        member.role = role;
        log_project_operation!("update_member_role", project.id, user_id = member.user_id, role = role);

        if member.status == MemberStatus::Active {
            self.project_binding(&project, &member.user_id, role).await;
        }

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::MemberRoleChanged,
                format!("Changed role of {} from {} to {}", member.user_email, previous, role),
                actor_id,
            )
            .with_metadata(json!({
                "member_id": member.id,
                "previous_role": previous,
                "role": role,
            })),
        )
        .await;

        Ok(member)
    }

    pub async fn get_member(&self, project_id: &str, member_id: &str) -> Result<ProjectMember> {
        let (_, member) = self.owned_member(project_id, member_id).await?;
        Ok(member)
    }

    pub async fn list_members(&self, project_id: &str) -> Result<MemberList> {
        db::projects::get(self.db.pool(), project_id).await?;
        let members = db::members::list_by_project(self.db.pool(), project_id).await?;
        let total = members.len() as i64;
        Ok(MemberList { members, total })
    }

    /// Activate or deactivate a membership
    ///
    /// Deactivation revokes the access binding; reactivation grants it again.
    pub async fn set_member_status(
        &self,
        project_id: &str,
        member_id: &str,
        status: MemberStatus,
        actor_id: &str,
    ) -> Result<ProjectMember> {
        let (project, mut member) = self.owned_member(project_id, member_id).await?;

        if member.status == status {
            debug!(project_id, member_id, status = %status, "Member status unchanged");
            return Ok(member);
        }

        db::members::update_status(self.db.pool(), &member.id, status).await?;
        let previous = member.status;
        member.status = status;

        match status {
            MemberStatus::Active => self.project_binding(&project, &member.user_id, member.role).await,
            MemberStatus::Inactive if project.has_namespace() => {
                if let Err(e) = self
                    .cluster
                    .remove_rbac(&project.workspace_id, &project.namespace_name, &member.user_id)
                    .await
                {
                    log_cluster_drift!("remove_rbac", project.id, e);
                }
            }
            MemberStatus::Inactive => {}
        }

        self.record(
            NewActivity::new(
                &project.id,
                ActivityType::MemberStatusChanged,
                format!("Set {} to {}", member.user_email, status),
                actor_id,
            )
            .with_metadata(json!({
                "member_id": member.id,
                "previous_status": previous,
                "status": status,
            })),
        )
        .await;

        Ok(member)
    }

    /// Load a project and one of its members, rejecting foreign members
    async fn owned_member(&self, project_id: &str, member_id: &str) -> Result<(Project, ProjectMember)> {
        let project = db::projects::get(self.db.pool(), project_id).await?;
        let member = db::members::get(self.db.pool(), member_id).await?;

        if member.project_id != project.id {
            return Err(Error::Mismatch("member does not belong to project".to_string()));
        }

        Ok((project, member))
    }

    async fn project_binding(&self, project: &Project, user_id: &str, role: ProjectRole) {
        if !project.has_namespace() {
            warn!(project_id = %project.id, user_id, "Project has no namespace; binding skipped");
            return;
        }

        if let Err(e) = self
            .cluster
            .apply_rbac(&project.workspace_id, &project.namespace_name, user_id, role)
            .await
        {
            log_cluster_drift!("apply_rbac", project.id, e);
        }
    }
}
