//! Activity Tests
//! Tests for the project audit trail and its retention

mod common;

use chrono::{Duration, Utc};
use common::{project_request, seed_user, setup};
use kaas_common::{ActivityFilter, Error, NewActivity};
use serde_json::json;

fn custom(project_id: &str, kind: &str, user_id: &str) -> NewActivity {
    NewActivity {
        project_id: project_id.to_string(),
        activity_type: kind.to_string(),
        description: format!("{} happened", kind),
        user_id: user_id.to_string(),
        metadata: json!({ "source": "pipeline" }),
    }
}

#[tokio::test]
async fn test_log_activity_resolves_user() {
    let (service, _cluster, db) = setup().await;
    seed_user(&db, "u-1", "dev@example.com", "Dev").await;
    let project = service.create_project(project_request("audited")).await.unwrap();

    let entry = service
        .log_activity(custom(&project.id, "deployment_started", "u-1"))
        .await
        .unwrap();

    assert_eq!(entry.activity_type, "deployment_started");
    assert_eq!(entry.user_email, "dev@example.com");
    assert_eq!(entry.user_name, "Dev");
    assert_eq!(entry.metadata["source"], "pipeline");
}

#[tokio::test]
async fn test_log_activity_validation() {
    let (service, _cluster, _db) = setup().await;

    let err = service.log_activity(custom("", "x", "u-1")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = service.log_activity(custom("missing", "x", "u-1")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_activity_filters() {
    let (service, _cluster, _db) = setup().await;
    let project = service.create_project(project_request("filtered")).await.unwrap();

    for _ in 0..3 {
        service
            .log_activity(custom(&project.id, "deployment_started", "u-1"))
            .await
            .unwrap();
    }
    service
        .log_activity(custom(&project.id, "deployment_started", "u-2"))
        .await
        .unwrap();

    let by_type = service
        .get_activity_logs(
            &project.id,
            &ActivityFilter {
                activity_type: Some("deployment_started".into()),
                page_size: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_type.total, 4);
    assert_eq!(by_type.activities.len(), 2);

    let by_user = service
        .get_activity_logs(
            &project.id,
            &ActivityFilter {
                user_id: Some("u-2".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_user.total, 1);

    let everything = service
        .get_activity_logs(&project.id, &ActivityFilter::default())
        .await
        .unwrap();
    assert_eq!(everything.total, 5);
    assert_eq!(everything.activities[0].activity_type, "deployment_started");
    assert_eq!(everything.activities[4].activity_type, "project_created");
}

#[tokio::test]
async fn test_activity_logs_past_last_page() {
    let (service, _cluster, _db) = setup().await;
    let project = service.create_project(project_request("paged")).await.unwrap();

    let filter = ActivityFilter {
        page: u32::MAX,
        page_size: 100,
        ..Default::default()
    };
    let logs = service.get_activity_logs(&project.id, &filter).await.unwrap();
    assert_eq!(logs.total, 1);
    assert!(logs.activities.is_empty());
}

#[tokio::test]
async fn test_activity_time_range_validation() {
    let (service, _cluster, _db) = setup().await;
    let project = service.create_project(project_request("ranged")).await.unwrap();

    let filter = ActivityFilter {
        since: Some(Utc::now()),
        until: Some(Utc::now() - Duration::hours(1)),
        ..Default::default()
    };
    let err = service.get_activity_logs(&project.id, &filter).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_cleanup_old_activities() {
    let (service, _cluster, _db) = setup().await;
    let project = service.create_project(project_request("pruned")).await.unwrap();
    service
        .log_activity(custom(&project.id, "note", "u-1"))
        .await
        .unwrap();

    let removed = service
        .cleanup_old_activities(Utc::now() - Duration::days(1))
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let removed = service
        .cleanup_old_activities(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(service.list_activities(&project.id, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_activities_survive_project_deletion() {
    let (service, _cluster, _db) = setup().await;
    let project = service.create_project(project_request("gone")).await.unwrap();

    service.delete_project(&project.id, "owner").await.unwrap();

    let trail = service.list_activities(&project.id, 0).await.unwrap();
    let kinds: Vec<_> = trail.iter().map(|a| a.activity_type.as_str()).collect();
    assert_eq!(kinds, vec!["project_deleted", "project_created"]);
}
