//! Secondary namespace records

use super::{column, decode_json, map_db_error};
use chrono::{DateTime, Utc};
use kaas_common::{Error, Namespace, ResourceQuota, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Sqlite, SqlitePool};

pub async fn insert(pool: &SqlitePool, ns: &Namespace) -> Result<()> {
    crate::log_db_operation!("insert", "namespaces", ns.id);

    sqlx::query(
        "INSERT INTO namespaces (id, name, project_id, description, status, resource_quota, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ns.id)
    .bind(&ns.name)
    .bind(&ns.project_id)
    .bind(&ns.description)
    .bind(&ns.status)
    .bind(ns.resource_quota.as_ref().map(serde_json::to_string).transpose()?)
    .bind(ns.created_at)
    .bind(ns.updated_at)
    .execute(pool)
    .await
    .map_err(|e| match map_db_error("Failed to create namespace", e) {
        Error::Conflict(_) => {
            Error::Conflict(format!("namespace '{}' already exists in project", ns.name))
        }
        other => other,
    })?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Namespace> {
    let row = sqlx::query("SELECT * FROM namespaces WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to load namespace", e))?
        .ok_or_else(|| Error::NotFound(format!("namespace {} not found", id)))?;

    row_to_namespace(&row)
}

pub async fn find_by_name(pool: &SqlitePool, project_id: &str, name: &str) -> Result<Option<Namespace>> {
    let row = sqlx::query("SELECT * FROM namespaces WHERE project_id = ? AND name = ?")
        .bind(project_id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to load namespace by name", e))?;

    row.as_ref().map(row_to_namespace).transpose()
}

/// Whether `name` is already a live namespace of any project in the workspace
///
/// Covers project names, bound project namespaces and secondary namespaces.
pub async fn name_in_use(pool: &SqlitePool, workspace_id: &str, name: &str) -> Result<bool> {
    let taken: i64 = sqlx::query_scalar(
        "SELECT EXISTS(
             SELECT 1 FROM projects WHERE workspace_id = ? AND (name = ? OR namespace_name = ?)
         ) OR EXISTS(
             SELECT 1 FROM namespaces n JOIN projects p ON p.id = n.project_id
             WHERE p.workspace_id = ? AND n.name = ?
         )",
    )
    .bind(workspace_id)
    .bind(name)
    .bind(name)
    .bind(workspace_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| map_db_error("Failed to check namespace name", e))?;

    Ok(taken != 0)
}

pub async fn list_by_project(pool: &SqlitePool, project_id: &str) -> Result<Vec<Namespace>> {
    let rows = sqlx::query("SELECT * FROM namespaces WHERE project_id = ? ORDER BY name")
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(|e| map_db_error("Failed to list namespaces", e))?;

    rows.iter().map(row_to_namespace).collect()
}

pub async fn count_by_project(pool: &SqlitePool, project_id: &str) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM namespaces WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await
        .map_err(|e| map_db_error("Failed to count namespaces", e))
}

pub async fn update(pool: &SqlitePool, ns: &Namespace) -> Result<()> {
    crate::log_db_operation!("update", "namespaces", ns.id);

    let result = sqlx::query(
        "UPDATE namespaces SET description = ?, status = ?, resource_quota = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&ns.description)
    .bind(&ns.status)
    .bind(ns.resource_quota.as_ref().map(serde_json::to_string).transpose()?)
    .bind(ns.updated_at)
    .bind(&ns.id)
    .execute(pool)
    .await
    .map_err(|e| map_db_error("Failed to update namespace", e))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("namespace {} not found", ns.id)));
    }

    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<()> {
    crate::log_db_operation!("delete", "namespaces", id);

    sqlx::query("DELETE FROM namespaces WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_db_error("Failed to delete namespace", e))?;

    Ok(())
}

pub async fn delete_by_project<'e, E>(executor: E, project_id: &str) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM namespaces WHERE project_id = ?")
        .bind(project_id)
        .execute(executor)
        .await
        .map_err(|e| map_db_error("Failed to delete project namespaces", e))?;

    Ok(result.rows_affected())
}

fn row_to_namespace(row: &SqliteRow) -> Result<Namespace> {
    let quota: Option<String> = column(row, "resource_quota")?;

    Ok(Namespace {
        id: column(row, "id")?,
        name: column(row, "name")?,
        project_id: column(row, "project_id")?,
        description: column(row, "description")?,
        status: column(row, "status")?,
        resource_quota: quota
            .as_deref()
            .map(|q| decode_json::<ResourceQuota>("resource_quota", q))
            .transpose()?,
        resource_usage: None,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}
