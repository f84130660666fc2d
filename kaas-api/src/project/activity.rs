//! Activity trail operations

use chrono::{DateTime, Utc};
use tracing::info;

use kaas_common::{ActivityFilter, ActivityList, Error, NewActivity, ProjectActivity, Result};

use super::ProjectService;
use crate::db;

/// Upper bound for `list_activities`
const MAX_RECENT_ACTIVITIES: u32 = 100;

impl ProjectService {
    /// Newest activities of a project; a zero limit selects the maximum
    pub async fn list_activities(&self, project_id: &str, limit: u32) -> Result<Vec<ProjectActivity>> {
        let limit = match limit {
            0 => MAX_RECENT_ACTIVITIES,
            n => n.min(MAX_RECENT_ACTIVITIES),
        };
        self.activities.recent(project_id, limit).await
    }

    /// Append a caller-supplied activity
    pub async fn log_activity(&self, activity: NewActivity) -> Result<ProjectActivity> {
        if activity.project_id.is_empty() {
            return Err(Error::Validation("project id is required".to_string()));
        }
        if activity.activity_type.trim().is_empty() {
            return Err(Error::Validation("activity type is required".to_string()));
        }
        db::projects::get(self.db.pool(), &activity.project_id).await?;

        self.activities.record(&activity).await
    }

    /// Filtered, paginated trail of a project
    pub async fn get_activity_logs(&self, project_id: &str, filter: &ActivityFilter) -> Result<ActivityList> {
        if let (Some(since), Some(until)) = (filter.since, filter.until) {
            if since > until {
                return Err(Error::Validation("'since' must not be after 'until'".to_string()));
            }
        }
        self.activities.query(project_id, filter).await
    }

    /// Prune activities created before `before`; returns the number removed
    pub async fn cleanup_old_activities(&self, before: DateTime<Utc>) -> Result<u64> {
        let removed = self.activities.cleanup_before(before).await?;
        info!(removed, before = %before, "Pruned old activities");
        Ok(removed)
    }
}
