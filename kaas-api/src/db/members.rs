//! Project membership records

use super::{column, map_db_error};
use chrono::{DateTime, Utc};
use kaas_common::{Error, MemberStatus, ProjectMember, ProjectRole, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite, SqlitePool};

/// Insert a membership; a second row for the same (project, user) pair is a conflict
pub async fn insert(pool: &SqlitePool, member: &ProjectMember) -> Result<()> {
    crate::log_db_operation!("insert", "project_members", member.id);

    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, user_email, user_name, role, status, added_by, added_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&member.id)
    .bind(&member.project_id)
    .bind(&member.user_id)
    .bind(&member.user_email)
    .bind(&member.user_name)
    .bind(member.role.as_str())
    .bind(member.status.as_str())
    .bind(&member.added_by)
    .bind(member.added_at)
    .execute(pool)
    .await
    .map_err(|e| match map_db_error("Failed to add project member", e) {
        Error::Conflict(_) => Error::Conflict("user is already a project member".to_string()),
        other => other,
    })?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<ProjectMember> {
    let row = sqlx::query("SELECT * FROM project_members WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to load project member", e))?
        .ok_or_else(|| Error::NotFound(format!("project member {} not found", id)))?;

    row_to_member(&row)
}

pub async fn find_by_user(pool: &SqlitePool, project_id: &str, user_id: &str) -> Result<Option<ProjectMember>> {
    let row = sqlx::query("SELECT * FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to load project member", e))?;

    row.as_ref().map(row_to_member).transpose()
}

pub async fn list_by_project(pool: &SqlitePool, project_id: &str) -> Result<Vec<ProjectMember>> {
    let rows = sqlx::query("SELECT * FROM project_members WHERE project_id = ? ORDER BY added_at, id")
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(|e| map_db_error("Failed to list project members", e))?;

    rows.iter().map(row_to_member).collect()
}

pub async fn count_by_project(pool: &SqlitePool, project_id: &str) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await
        .map_err(|e| map_db_error("Failed to count project members", e))
}

pub async fn update_role(pool: &SqlitePool, id: &str, role: ProjectRole) -> Result<()> {
    let result = sqlx::query("UPDATE project_members SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_db_error("Failed to update member role", e))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("project member {} not found", id)));
    }

    Ok(())
}

pub async fn update_status(pool: &SqlitePool, id: &str, status: MemberStatus) -> Result<()> {
    let result = sqlx::query("UPDATE project_members SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_db_error("Failed to update member status", e))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("project member {} not found", id)));
    }

    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<()> {
    crate::log_db_operation!("delete", "project_members", id);

    sqlx::query("DELETE FROM project_members WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_db_error("Failed to remove project member", e))?;

    Ok(())
}

pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(project_id)
        .execute(executor)
        .await
        .map_err(|e| map_db_error("Failed to remove project members", e))?;

    Ok(result.rows_affected())
}

fn row_to_member(row: &SqliteRow) -> Result<ProjectMember> {
    let role: String = column(row, "role")?;
    let status: String = column(row, "status")?;

    Ok(ProjectMember {
        id: column(row, "id")?,
        project_id: column(row, "project_id")?,
        user_id: column(row, "user_id")?,
        user_email: column(row, "user_email")?,
        user_name: column(row, "user_name")?,
        role: role
            .parse()
            .map_err(|_| Error::Database(format!("Unknown member role '{}'", role)))?,
        status: status
            .parse()
            .map_err(|_| Error::Database(format!("Unknown member status '{}'", status)))?,
        added_by: column(row, "added_by")?,
        added_at: column::<DateTime<Utc>>(row, "added_at")?,
    })
}
