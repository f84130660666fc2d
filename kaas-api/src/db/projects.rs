//! Project records

use super::{column, decode_json, like_pattern, map_db_error};
use chrono::{DateTime, Utc};
use kaas_common::{Error, Project, ProjectFilter, ProjectStatus, ResourceQuota, Result, Settings, SortOrder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

/// Columns a listing may be ordered by
const SORTABLE_COLUMNS: &[&str] = &["name", "display_name", "status", "created_at", "updated_at"];

pub async fn insert(pool: &SqlitePool, project: &Project) -> Result<()> {
    crate::log_db_operation!("insert", "projects", project.id);

    sqlx::query(
        "INSERT INTO projects (id, name, display_name, description, workspace_id, parent_id,
             namespace_name, status, settings, resource_quota, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.display_name)
    .bind(&project.description)
    .bind(&project.workspace_id)
    .bind(&project.parent_id)
    .bind(&project.namespace_name)
    .bind(project.status.as_str())
    .bind(serde_json::to_string(&project.settings)?)
    .bind(encode_quota(&project.resource_quota)?)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .map_err(|e| match map_db_error("Failed to create project", e) {
        Error::Conflict(_) => Error::Conflict(format!(
            "project '{}' already exists in workspace '{}'",
            project.name, project.workspace_id
        )),
        other => other,
    })?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Project> {
    find(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("project {} not found", id)))
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Project>> {
    let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to load project", e))?;

    row.as_ref().map(row_to_project).transpose()
}

pub async fn find_by_name(pool: &SqlitePool, workspace_id: &str, name: &str) -> Result<Option<Project>> {
    let row = sqlx::query("SELECT * FROM projects WHERE workspace_id = ? AND name = ?")
        .bind(workspace_id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to load project by name", e))?;

    row.as_ref().map(row_to_project).transpose()
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a ProjectFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(ref workspace_id) = filter.workspace_id {
        builder.push(" AND workspace_id = ").push_bind(workspace_id.as_str());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR display_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Page of projects matching `filter` plus the total match count
pub async fn list(pool: &SqlitePool, filter: &ProjectFilter) -> Result<(Vec<Project>, i64)> {
    let (page, page_size) = kaas_common::normalize_page(filter.page, filter.page_size);

    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects");
    push_filters(&mut count_query, filter);
    let total: i64 = count_query
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(|e| map_db_error("Failed to count projects", e))?;

    let sort_column = filter
        .sort_by
        .as_deref()
        .filter(|c| SORTABLE_COLUMNS.contains(c))
        .unwrap_or("created_at");
    let direction = match filter.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM projects");
    push_filters(&mut query, filter);
    query
        .push(format!(" ORDER BY {} {}, id ASC", sort_column, direction))
        .push(" LIMIT ")
        .push_bind(i64::from(page_size))
        .push(" OFFSET ")
        .push_bind(kaas_common::page_offset(page, page_size));

    let rows = query
        .build()
        .fetch_all(pool)
        .await
        .map_err(|e| map_db_error("Failed to list projects", e))?;

    let projects = rows.iter().map(row_to_project).collect::<Result<Vec<_>>>()?;
    Ok((projects, total))
}

/// Persist every mutable field of `project`
pub async fn update(pool: &SqlitePool, project: &Project) -> Result<()> {
    crate::log_db_operation!("update", "projects", project.id);

    let result = sqlx::query(
        "UPDATE projects SET display_name = ?, description = ?, namespace_name = ?, status = ?,
             settings = ?, resource_quota = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&project.display_name)
    .bind(&project.description)
    .bind(&project.namespace_name)
    .bind(project.status.as_str())
    .bind(serde_json::to_string(&project.settings)?)
    .bind(encode_quota(&project.resource_quota)?)
    .bind(project.updated_at)
    .bind(&project.id)
    .execute(pool)
    .await
    .map_err(|e| map_db_error("Failed to update project", e))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("project {} not found", project.id)));
    }

    Ok(())
}

pub async fn update_status(pool: &SqlitePool, id: &str, status: ProjectStatus) -> Result<()> {
    let result = sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| map_db_error("Failed to update project status", e))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("project {} not found", id)));
    }

    Ok(())
}

pub async fn delete<'e, E>(executor: E, id: &str) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    crate::log_db_operation!("delete", "projects", id);

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await
        .map_err(|e| map_db_error("Failed to delete project", e))?;

    Ok(())
}

/// Delete a project with its memberships and secondary namespace rows in one
/// transaction. Returns the number of (members, namespaces) removed.
pub async fn delete_with_dependents(pool: &SqlitePool, id: &str) -> Result<(u64, u64)> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_db_error("Failed to start project delete", e))?;

    let members = super::members::delete_by_project(&mut *tx, id).await?;
    let namespaces = super::namespaces::delete_by_project(&mut *tx, id).await?;
    delete(&mut *tx, id).await?;

    tx.commit()
        .await
        .map_err(|e| map_db_error("Failed to commit project delete", e))?;

    Ok((members, namespaces))
}

/// Direct children of a project, ordered by name
pub async fn children(pool: &SqlitePool, parent_id: &str) -> Result<Vec<Project>> {
    let rows = sqlx::query("SELECT * FROM projects WHERE parent_id = ? ORDER BY name")
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .map_err(|e| map_db_error("Failed to list child projects", e))?;

    rows.iter().map(row_to_project).collect()
}

pub async fn count_children(pool: &SqlitePool, parent_id: &str) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE parent_id = ?")
        .bind(parent_id)
        .fetch_one(pool)
        .await
        .map_err(|e| map_db_error("Failed to count child projects", e))
}

fn encode_quota(quota: &Option<ResourceQuota>) -> Result<Option<String>> {
    quota
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(Error::from)
}

fn row_to_project(row: &SqliteRow) -> Result<Project> {
    let status: String = column(row, "status")?;
    let settings: String = column(row, "settings")?;
    let quota: Option<String> = column(row, "resource_quota")?;

    Ok(Project {
        id: column(row, "id")?,
        name: column(row, "name")?,
        display_name: column(row, "display_name")?,
        description: column(row, "description")?,
        workspace_id: column(row, "workspace_id")?,
        parent_id: column(row, "parent_id")?,
        namespace_name: column(row, "namespace_name")?,
        status: status
            .parse()
            .map_err(|_| Error::Database(format!("Unknown project status '{}'", status)))?,
        settings: decode_json::<Settings>("settings", &settings)?,
        resource_quota: quota
            .as_deref()
            .map(|q| decode_json::<ResourceQuota>("resource_quota", q))
            .transpose()?,
        namespace_status: None,
        resource_usage: None,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    fn project(name: &str, workspace: &str, parent: Option<&str>) -> Project {
        let now = Utc::now();
        Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            display_name: name.to_uppercase(),
            description: format!("{} service", name),
            workspace_id: workspace.to_string(),
            parent_id: parent.map(String::from),
            namespace_name: String::new(),
            status: ProjectStatus::Active,
            settings: Settings::new(),
            resource_quota: None,
            namespace_status: None,
            resource_usage: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = memory_db().await;
        let mut p = project("billing", "ws-1", None);
        p.settings.insert("tier".into(), serde_json::json!("gold"));
        p.resource_quota = Some(ResourceQuota {
            cpu: Some("2".into()),
            ..Default::default()
        });
        insert(db.pool(), &p).await.unwrap();

        let loaded = get(db.pool(), &p.id).await.unwrap();
        assert_eq!(loaded.name, "billing");
        assert_eq!(loaded.settings["tier"], "gold");
        assert_eq!(loaded.resource_quota.unwrap().cpu.as_deref(), Some("2"));
        assert!(loaded.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_in_workspace_conflicts() {
        let db = memory_db().await;
        insert(db.pool(), &project("billing", "ws-1", None)).await.unwrap();

        let err = insert(db.pool(), &project("billing", "ws-1", None)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m.contains("already exists")));

        // Same name in another workspace is fine
        insert(db.pool(), &project("billing", "ws-2", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let db = memory_db().await;
        assert!(matches!(get(db.pool(), "nope").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let db = memory_db().await;
        for name in ["alpha", "beta", "gamma", "delta"] {
            insert(db.pool(), &project(name, "ws-1", None)).await.unwrap();
        }
        insert(db.pool(), &project("omega", "ws-2", None)).await.unwrap();

        let filter = ProjectFilter {
            workspace_id: Some("ws-1".into()),
            page: 1,
            page_size: 3,
            sort_by: Some("name".into()),
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let (page1, total) = list(db.pool(), &filter).await.unwrap();
        assert_eq!(total, 4);
        let names: Vec<_> = page1.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta", "delta"]);

        let (page2, _) = list(db.pool(), &ProjectFilter { page: 2, ..filter.clone() }).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].name, "gamma");

        let search = ProjectFilter {
            search: Some("GAMMA".into()),
            ..Default::default()
        };
        let (found, total) = list(db.pool(), &search).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].name, "gamma");
    }

    #[tokio::test]
    async fn test_list_ignores_unknown_sort_column() {
        let db = memory_db().await;
        insert(db.pool(), &project("alpha", "ws-1", None)).await.unwrap();

        let filter = ProjectFilter {
            sort_by: Some("name; DROP TABLE projects".into()),
            ..Default::default()
        };
        let (projects, total) = list(db.pool(), &filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(projects.len(), 1);
    }

    #[tokio::test]
    async fn test_children_ordered_by_name() {
        let db = memory_db().await;
        let root = project("root", "ws-1", None);
        insert(db.pool(), &root).await.unwrap();
        insert(db.pool(), &project("zeta", "ws-1", Some(&root.id))).await.unwrap();
        insert(db.pool(), &project("eta", "ws-1", Some(&root.id))).await.unwrap();

        let kids = children(db.pool(), &root.id).await.unwrap();
        let names: Vec<_> = kids.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["eta", "zeta"]);
        assert_eq!(count_children(db.pool(), &root.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_with_dependents() {
        let db = memory_db().await;
        let p = project("billing", "ws-1", None);
        insert(db.pool(), &p).await.unwrap();
        insert_dependents(&db, &p.id).await;

        let (members, namespaces) = delete_with_dependents(db.pool(), &p.id).await.unwrap();
        assert_eq!((members, namespaces), (1, 1));
        assert!(find(db.pool(), &p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_dependents_is_atomic() {
        let db = memory_db().await;
        let p = project("billing", "ws-1", None);
        insert(db.pool(), &p).await.unwrap();
        insert_dependents(&db, &p.id).await;

        sqlx::query(
            "CREATE TRIGGER refuse_project_delete BEFORE DELETE ON projects
             BEGIN SELECT RAISE(ABORT, 'refused'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        assert!(delete_with_dependents(db.pool(), &p.id).await.is_err());
        assert!(find(db.pool(), &p.id).await.unwrap().is_some());
        assert_eq!(crate::db::members::count_by_project(db.pool(), &p.id).await.unwrap(), 1);
        assert_eq!(crate::db::namespaces::count_by_project(db.pool(), &p.id).await.unwrap(), 1);
    }

    async fn insert_dependents(db: &crate::db::Database, project_id: &str) {
        let now = Utc::now();
        crate::db::members::insert(
            db.pool(),
            &kaas_common::ProjectMember {
                id: uuid::Uuid::new_v4().to_string(),
                project_id: project_id.to_string(),
                user_id: "u1".into(),
                user_email: "u1@example.com".into(),
                user_name: "U1".into(),
                role: kaas_common::ProjectRole::Viewer,
                status: kaas_common::MemberStatus::Active,
                added_by: "actor".into(),
                added_at: now,
            },
        )
        .await
        .unwrap();
        crate::db::namespaces::insert(
            db.pool(),
            &kaas_common::Namespace {
                id: uuid::Uuid::new_v4().to_string(),
                name: "billing-jobs".into(),
                project_id: project_id.to_string(),
                description: String::new(),
                status: "active".into(),
                resource_quota: None,
                resource_usage: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_update_status_and_delete() {
        let db = memory_db().await;
        let p = project("billing", "ws-1", None);
        insert(db.pool(), &p).await.unwrap();

        update_status(db.pool(), &p.id, ProjectStatus::Terminating).await.unwrap();
        assert_eq!(get(db.pool(), &p.id).await.unwrap().status, ProjectStatus::Terminating);

        delete(db.pool(), &p.id).await.unwrap();
        assert!(find(db.pool(), &p.id).await.unwrap().is_none());
    }
}
