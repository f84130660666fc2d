//! Shapes exchanged with the cluster adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the quota object every managed namespace carries
pub const PROJECT_QUOTA_NAME: &str = "project-quota";

pub const LABEL_PROJECT_ID: &str = "kaas.io/project-id";
pub const LABEL_WORKSPACE_ID: &str = "kaas.io/workspace-id";
pub const LABEL_MANAGED: &str = "kaas.io/managed";

/// Live namespace as reported by the cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub name: String,
    /// Phase reported by the API server (Active, Terminating)
    pub status: String,
    pub labels: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Labels stamped on namespaces this engine creates
pub fn managed_labels(workspace_id: &str, project_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_PROJECT_ID.to_string(), project_id.to_string()),
        (LABEL_WORKSPACE_ID.to_string(), workspace_id.to_string()),
        (LABEL_MANAGED.to_string(), "true".to_string()),
    ])
}

/// Owner of an existing namespace when it is labelled for a different project than `labels`
pub fn foreign_owner<'a>(existing: &'a NamespaceInfo, labels: &BTreeMap<String, String>) -> Option<&'a str> {
    let owner = existing.labels.get(LABEL_PROJECT_ID)?;
    let wanted = labels.get(LABEL_PROJECT_ID)?;
    (owner != wanted).then_some(owner.as_str())
}

/// Name of the access binding granted to a user
pub fn binding_name(user_id: &str) -> String {
    format!("user-{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_labels() {
        let labels = managed_labels("ws-1", "p-1");
        assert_eq!(labels[LABEL_WORKSPACE_ID], "ws-1");
        assert_eq!(labels[LABEL_PROJECT_ID], "p-1");
        assert_eq!(labels[LABEL_MANAGED], "true");
    }

    #[test]
    fn test_foreign_owner() {
        let existing = NamespaceInfo {
            name: "shared".into(),
            status: "Active".into(),
            labels: managed_labels("ws-1", "team-a"),
            created_at: None,
        };

        assert_eq!(foreign_owner(&existing, &managed_labels("ws-1", "team-b")), Some("team-a"));
        assert_eq!(foreign_owner(&existing, &managed_labels("ws-1", "team-a")), None);
        assert_eq!(foreign_owner(&existing, &BTreeMap::new()), None);

        let unlabelled = NamespaceInfo {
            labels: BTreeMap::new(),
            ..existing
        };
        assert_eq!(foreign_owner(&unlabelled, &managed_labels("ws-1", "team-b")), None);
    }

    #[test]
    fn test_binding_name() {
        assert_eq!(binding_name("42"), "user-42");
    }
}
