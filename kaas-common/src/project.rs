//! Tenant project data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::roles::ProjectRole;

/// Open key/value bag attached to a project
pub type Settings = BTreeMap<String, serde_json::Value>;

/// Settings key holding the last applied quota
pub const SETTINGS_RESOURCE_QUOTA: &str = "resource_quota";
/// Settings key holding the parent link of a sub-project
pub const SETTINGS_HIERARCHY: &str = "hierarchy";

/// Project lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Creating,
    Active,
    Error,
    Terminating,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Creating => "creating",
            ProjectStatus::Active => "active",
            ProjectStatus::Error => "error",
            ProjectStatus::Terminating => "terminating",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(ProjectStatus::Creating),
            "active" => Ok(ProjectStatus::Active),
            "error" => Ok(ProjectStatus::Error),
            "terminating" => Ok(ProjectStatus::Terminating),
            other => Err(crate::Error::Validation(format!("invalid project status '{}'", other))),
        }
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "inactive" => Ok(MemberStatus::Inactive),
            other => Err(crate::Error::Validation(format!("invalid member status '{}'", other))),
        }
    }
}

/// Resource limits for a namespace. Unset, empty or zero fields mean "no limit".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceQuota {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claims: Option<u32>,
}

impl ResourceQuota {
    /// True when no field sets a limit
    pub fn is_empty(&self) -> bool {
        let unset_str = |v: &Option<String>| v.as_deref().map_or(true, str::is_empty);
        let unset_count = |v: &Option<u32>| v.map_or(true, |n| n == 0);

        unset_str(&self.cpu)
            && unset_str(&self.memory)
            && unset_str(&self.storage)
            && unset_count(&self.pods)
            && unset_count(&self.services)
            && unset_count(&self.persistent_volume_claims)
    }
}

/// Live consumption of a namespace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceUsage {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub pods: i64,
}

impl ResourceUsage {
    /// Usage reported when a namespace carries no quota object
    pub fn zero() -> Self {
        Self {
            cpu: "0".to_string(),
            memory: "0".to_string(),
            storage: "0".to_string(),
            pods: 0,
        }
    }
}

impl Default for ResourceUsage {
    fn default() -> Self {
        Self::zero()
    }
}

/// A logical tenant sub-division bound to one namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Empty until the live namespace has been created
    #[serde(default)]
    pub namespace_name: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<ResourceQuota>,
    /// Live namespace phase, never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_status: Option<String>,
    /// Live quota consumption, never stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<ResourceUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn has_namespace(&self) -> bool {
        !self.namespace_name.is_empty()
    }
}

/// A secondary namespace owned by a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub description: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_quota: Option<ResourceQuota>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<ResourceUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub role: ProjectRole,
    pub status: MemberStatus,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

/// Immutable audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectActivity {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Activity types written by the project service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    SubprojectCreated,
    QuotaChanged,
    NamespaceCreated,
    NamespaceUpdated,
    NamespaceDeleted,
    MemberAdded,
    MemberRemoved,
    MemberRoleChanged,
    MemberStatusChanged,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::ProjectCreated => "project_created",
            ActivityType::ProjectUpdated => "project_updated",
            ActivityType::ProjectDeleted => "project_deleted",
            ActivityType::SubprojectCreated => "subproject_created",
            ActivityType::QuotaChanged => "quota_changed",
            ActivityType::NamespaceCreated => "namespace_created",
            ActivityType::NamespaceUpdated => "namespace_updated",
            ActivityType::NamespaceDeleted => "namespace_deleted",
            ActivityType::MemberAdded => "member_added",
            ActivityType::MemberRemoved => "member_removed",
            ActivityType::MemberRoleChanged => "member_role_changed",
            ActivityType::MemberStatusChanged => "member_status_changed",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity store record, read-only for this crate's callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub resource_quota: Option<ResourceQuota>,
    /// User id recorded on the creation activity
    #[serde(default)]
    pub created_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Merged into the stored settings; keys present here win
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub updated_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNamespaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resource_quota: Option<ResourceQuota>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNamespaceRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resource_quota: Option<ResourceQuota>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub user_email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: String,
}

/// Free-form activity append
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub project_id: String,
    pub activity_type: String,
    pub description: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl NewActivity {
    pub fn new(
        project_id: impl Into<String>,
        activity_type: ActivityType,
        description: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            activity_type: activity_type.as_str().to_string(),
            description: description.into(),
            user_id: user_id.into(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ============================================================================
// Filters and listings
// ============================================================================

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFilter {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    /// Matched against name, display name and description
    #[serde(default)]
    pub search: Option<String>,
    /// 1-based; 0 is treated as 1
    #[serde(default)]
    pub page: u32,
    /// 0 selects the default page size
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// Clamp page/page size pairs to sane values
pub fn normalize_page(page: u32, page_size: u32) -> (u32, u32) {
    let page = page.max(1);
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };
    (page, page_size)
}

/// Row offset of a 1-based page, computed wide so large page numbers cannot overflow
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.saturating_sub(1)).saturating_mul(i64::from(page_size))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceList {
    pub namespaces: Vec<Namespace>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberList {
    pub members: Vec<ProjectMember>,
    pub total: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityList {
    pub activities: Vec<ProjectActivity>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStats {
    pub project_id: String,
    pub namespace_count: i64,
    pub member_count: i64,
    pub sub_project_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<ResourceUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// Project tree rooted at one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectHierarchy {
    pub project: Project,
    pub children: Vec<ProjectHierarchy>,
}

impl ProjectHierarchy {
    /// Number of projects in the tree, root included
    pub fn project_count(&self) -> usize {
        1 + self.children.iter().map(ProjectHierarchy::project_count).sum::<usize>()
    }

    /// Depth-first lookup by project id
    pub fn find(&self, project_id: &str) -> Option<&ProjectHierarchy> {
        if self.project.id == project_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(project_id))
    }

    /// All project ids in depth-first order
    pub fn ids(&self) -> Vec<&str> {
        let mut out = vec![self.project.id.as_str()];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}
