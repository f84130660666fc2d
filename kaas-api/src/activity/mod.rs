//! Project activity trail
//!
//! Append-only audit entries for every governance action, stored in the
//! metadata database. Entries outlive the project they describe and are
//! pruned only by age.

pub mod retention;

use chrono::{DateTime, TimeDelta, Utc};
use kaas_common::{
    normalize_page, page_offset, ActivityFilter, ActivityList, Error, NewActivity, ProjectActivity, Result,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{error, info};

use crate::config::MAX_RETENTION_DAYS;
use crate::db::{self, column, decode_json, map_db_error};

/// Database-backed activity log
#[derive(Clone)]
pub struct ActivityLog {
    db: SqlitePool,
}

impl ActivityLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append an entry, resolving the acting user's email and name when known
    pub async fn record(&self, new: &NewActivity) -> Result<ProjectActivity> {
        let user = if new.user_id.is_empty() {
            None
        } else {
            db::users::find(&self.db, &new.user_id).await?
        };

        let metadata = match &new.metadata {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };

        let activity = ProjectActivity {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: new.project_id.clone(),
            activity_type: new.activity_type.clone(),
            description: new.description.clone(),
            user_id: new.user_id.clone(),
            user_email: user.as_ref().map(|u| u.email.clone()).unwrap_or_default(),
            user_name: user.map(|u| u.display_name).unwrap_or_default(),
            metadata,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO project_activities (id, project_id, activity_type, description,
                 user_id, user_email, user_name, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&activity.id)
        .bind(&activity.project_id)
        .bind(&activity.activity_type)
        .bind(&activity.description)
        .bind(&activity.user_id)
        .bind(&activity.user_email)
        .bind(&activity.user_name)
        .bind(serde_json::to_string(&activity.metadata)?)
        .bind(activity.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!(project_id = %activity.project_id, "Failed to insert activity: {}", e);
            map_db_error("Failed to log activity", e)
        })?;

        Ok(activity)
    }

    /// Most recent entries for a project, newest first
    pub async fn recent(&self, project_id: &str, limit: u32) -> Result<Vec<ProjectActivity>> {
        let rows = sqlx::query(
            "SELECT * FROM project_activities WHERE project_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(project_id)
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await
        .map_err(|e| map_db_error("Failed to list activities", e))?;

        rows.iter().map(row_to_activity).collect()
    }

    /// Filtered, paginated entries for a project, newest first
    pub async fn query(&self, project_id: &str, filter: &ActivityFilter) -> Result<ActivityList> {
        let (page, page_size) = normalize_page(filter.page, filter.page_size);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM project_activities");
        push_filters(&mut count, project_id, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_db_error("Failed to count activities", e))?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM project_activities");
        push_filters(&mut query, project_id, filter);
        query
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(page_offset(page, page_size));

        let rows = query
            .build()
            .fetch_all(&self.db)
            .await
            .map_err(|e| map_db_error("Failed to query activities", e))?;

        Ok(ActivityList {
            activities: rows.iter().map(row_to_activity).collect::<Result<Vec<_>>>()?,
            total,
            page,
            page_size,
        })
    }

    /// Timestamp of the newest entry for a project
    pub async fn last_activity(&self, project_id: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT created_at FROM project_activities WHERE project_id = ?
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(project_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_db_error("Failed to load last activity", e))?;

        row.as_ref()
            .map(|r| column::<DateTime<Utc>>(r, "created_at"))
            .transpose()
    }

    /// Entry counts per activity type for a project
    pub async fn counts_by_type(&self, project_id: &str) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT activity_type, COUNT(*) as count FROM project_activities
             WHERE project_id = ? GROUP BY activity_type",
        )
        .bind(project_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| map_db_error("Failed to count activities", e))?;

        let mut counts = HashMap::new();
        for row in rows {
            counts.insert(column::<String>(&row, "activity_type")?, column::<i64>(&row, "count")?);
        }

        Ok(counts)
    }

    /// Delete every entry created before `before`, returning the number removed
    pub async fn cleanup_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM project_activities WHERE created_at < ?")
            .bind(before)
            .execute(&self.db)
            .await
            .map_err(|e| map_db_error("Failed to clean up activities", e))?;

        info!(
            removed = result.rows_affected(),
            before = %before,
            "Cleaned up old project activities"
        );

        Ok(result.rows_affected())
    }

    /// Retention policy: drop entries older than `days`
    pub async fn cleanup_older_than(&self, days: i64) -> Result<u64> {
        self.cleanup_before(retention_cutoff(Utc::now(), days)?).await
    }
}

/// Oldest timestamp kept by a retention of `days` days counted back from `now`
pub fn retention_cutoff(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if days <= 0 {
        return Err(Error::Validation("retention must be at least one day".to_string()));
    }
    if days > MAX_RETENTION_DAYS {
        return Err(Error::Validation(format!(
            "retention must not exceed {} days",
            MAX_RETENTION_DAYS
        )));
    }

    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| Error::Validation(format!("retention of {} days is out of range", days)))
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, project_id: &'a str, filter: &'a ActivityFilter) {
    builder.push(" WHERE project_id = ").push_bind(project_id);

    if let Some(ref activity_type) = filter.activity_type {
        builder.push(" AND activity_type = ").push_bind(activity_type.as_str());
    }
    if let Some(ref user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id.as_str());
    }
    if let Some(since) = filter.since {
        builder.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND created_at < ").push_bind(until);
    }
}

fn row_to_activity(row: &SqliteRow) -> Result<ProjectActivity> {
    let metadata: String = column(row, "metadata")?;

    Ok(ProjectActivity {
        id: column(row, "id")?,
        project_id: column(row, "project_id")?,
        activity_type: column(row, "activity_type")?,
        description: column(row, "description")?,
        user_id: column(row, "user_id")?,
        user_email: column(row, "user_email")?,
        user_name: column(row, "user_name")?,
        metadata: decode_json("metadata", &metadata)?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;
    use kaas_common::{ActivityType, User};

    #[test]
    fn test_retention_cutoff_bounds() {
        let now = Utc::now();
        assert_eq!(retention_cutoff(now, 30).unwrap(), now - TimeDelta::days(30));
        assert!(matches!(retention_cutoff(now, 0), Err(Error::Validation(_))));
        assert!(matches!(retention_cutoff(now, MAX_RETENTION_DAYS + 1), Err(Error::Validation(_))));
        assert!(matches!(retention_cutoff(now, 200_000_000_000_000), Err(Error::Validation(_))));
        assert!(matches!(retention_cutoff(now, i64::MAX), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_cleanup_rejects_huge_retention() {
        let log = setup().await;
        let err = log.cleanup_older_than(200_000_000_000_000).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    async fn setup() -> ActivityLog {
        let db = memory_db().await;
        db::users::upsert(
            db.pool(),
            &User {
                id: "u1".into(),
                email: "alice@example.com".into(),
                display_name: "Alice".into(),
            },
        )
        .await
        .unwrap();
        ActivityLog::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_record_resolves_user() {
        let log = setup().await;
        let entry = log
            .record(&NewActivity::new("p1", ActivityType::ProjectCreated, "created", "u1"))
            .await
            .unwrap();

        assert_eq!(entry.user_email, "alice@example.com");
        assert_eq!(entry.user_name, "Alice");
        assert!(entry.metadata.is_object());

        let anonymous = log
            .record(&NewActivity::new("p1", ActivityType::QuotaChanged, "quota", ""))
            .await
            .unwrap();
        assert_eq!(anonymous.user_email, "");
    }

    #[tokio::test]
    async fn test_query_filters_by_type_and_user() {
        let log = setup().await;
        log.record(&NewActivity::new("p1", ActivityType::ProjectCreated, "created", "u1"))
            .await
            .unwrap();
        log.record(&NewActivity::new("p1", ActivityType::MemberAdded, "added", "u2"))
            .await
            .unwrap();
        log.record(&NewActivity::new("p1", ActivityType::MemberAdded, "added", "u1"))
            .await
            .unwrap();
        log.record(&NewActivity::new("p2", ActivityType::MemberAdded, "other", "u1"))
            .await
            .unwrap();

        let filter = ActivityFilter {
            activity_type: Some("member_added".into()),
            ..Default::default()
        };
        let list = log.query("p1", &filter).await.unwrap();
        assert_eq!(list.total, 2);

        let filter = ActivityFilter {
            activity_type: Some("member_added".into()),
            user_id: Some("u1".into()),
            ..Default::default()
        };
        assert_eq!(log.query("p1", &filter).await.unwrap().total, 1);

        let counts = log.counts_by_type("p1").await.unwrap();
        assert_eq!(counts.get("member_added"), Some(&2));
        assert_eq!(counts.get("project_created"), Some(&1));
    }

    #[tokio::test]
    async fn test_recent_and_last_activity() {
        let log = setup().await;
        assert!(log.last_activity("p1").await.unwrap().is_none());

        log.record(&NewActivity::new("p1", ActivityType::ProjectCreated, "first", "u1"))
            .await
            .unwrap();
        let second = log
            .record(&NewActivity::new("p1", ActivityType::ProjectUpdated, "second", "u1"))
            .await
            .unwrap();

        let recent = log.recent("p1", 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);
        assert_eq!(log.last_activity("p1").await.unwrap(), Some(second.created_at));
    }

    #[tokio::test]
    async fn test_cleanup_before_cutoff() {
        let log = setup().await;
        log.record(&NewActivity::new("p1", ActivityType::ProjectCreated, "old", "u1"))
            .await
            .unwrap();

        // Nothing is older than an hour ago
        let removed = log.cleanup_before(Utc::now() - chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(removed, 0);

        let removed = log.cleanup_before(Utc::now() + chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(log.recent("p1", 10).await.unwrap().is_empty());

        assert!(log.cleanup_older_than(0).await.is_err());
    }
}
