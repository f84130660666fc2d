//! Project access checks

use kaas_common::{AccessDeniedReason, Error, MemberStatus, ProjectMember, ProjectRole, Result};

use super::ProjectService;
use crate::db;

impl ProjectService {
    /// Check that `user_id` holds an active membership satisfying `required_role`
    ///
    /// Returns the membership on success. An unknown required role is never satisfied.
    pub async fn validate_project_access(
        &self,
        user_id: &str,
        project_id: &str,
        required_role: &str,
    ) -> Result<ProjectMember> {
        let member = db::members::find_by_user(self.db.pool(), project_id, user_id)
            .await?
            .ok_or(Error::AccessDenied(AccessDeniedReason::NotMember))?;

        check_member(&member, required_role)?;
        Ok(member)
    }

    /// Role of the user in the project
    pub async fn get_user_project_role(&self, user_id: &str, project_id: &str) -> Result<ProjectRole> {
        db::members::find_by_user(self.db.pool(), project_id, user_id)
            .await?
            .map(|m| m.role)
            .ok_or(Error::AccessDenied(AccessDeniedReason::NotMember))
    }
}

fn check_member(member: &ProjectMember, required_role: &str) -> Result<()> {
    if member.status != MemberStatus::Active {
        return Err(Error::AccessDenied(AccessDeniedReason::Inactive));
    }

    if !kaas_common::has_required_role(member.role.as_str(), required_role) {
        return Err(Error::AccessDenied(AccessDeniedReason::InsufficientRole {
            required: required_role.to_string(),
            actual: member.role.to_string(),
        }));
    }

    Ok(())
}
