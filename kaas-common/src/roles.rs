//! Project roles and the role sufficiency ladder

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role a member holds within a project
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Admin,
    Developer,
    Viewer,
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 3] = [ProjectRole::Admin, ProjectRole::Developer, ProjectRole::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::Developer => "developer",
            ProjectRole::Viewer => "viewer",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ProjectRole::Admin => 3,
            ProjectRole::Developer => 2,
            ProjectRole::Viewer => 1,
        }
    }

    /// Whether this role satisfies a requirement of `required`
    pub fn satisfies(&self, required: ProjectRole) -> bool {
        self.rank() >= required.rank()
    }

    /// Built-in cluster role granted to holders of this project role
    pub fn cluster_role(&self) -> &'static str {
        match self {
            ProjectRole::Admin => "admin",
            ProjectRole::Developer => "edit",
            ProjectRole::Viewer => "view",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(ProjectRole::Admin),
            "developer" => Ok(ProjectRole::Developer),
            "viewer" => Ok(ProjectRole::Viewer),
            other => Err(crate::Error::Validation(format!(
                "invalid role '{}': must be one of admin, developer, viewer",
                other
            ))),
        }
    }
}

/// String form of the sufficiency check. Unknown roles on either side never match.
pub fn has_required_role(user_role: &str, required_role: &str) -> bool {
    match (user_role.parse::<ProjectRole>(), required_role.parse::<ProjectRole>()) {
        (Ok(user), Ok(required)) => user.satisfies(required),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_required_role() {
        let cases = [
            ("admin", "admin", true),
            ("admin", "developer", true),
            ("admin", "viewer", true),
            ("developer", "admin", false),
            ("developer", "developer", true),
            ("developer", "viewer", true),
            ("viewer", "admin", false),
            ("viewer", "developer", false),
            ("viewer", "viewer", true),
            ("invalid", "viewer", false),
            ("admin", "invalid", false),
            ("", "", false),
        ];

        for (user, required, expected) in cases {
            assert_eq!(
                has_required_role(user, required),
                expected,
                "has_required_role({:?}, {:?})",
                user,
                required
            );
        }
    }

    #[test]
    fn test_cluster_role_mapping() {
        assert_eq!(ProjectRole::Admin.cluster_role(), "admin");
        assert_eq!(ProjectRole::Developer.cluster_role(), "edit");
        assert_eq!(ProjectRole::Viewer.cluster_role(), "view");
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in ProjectRole::ALL {
            assert_eq!(role.as_str().parse::<ProjectRole>().unwrap(), role);
        }
        assert!("Admin".parse::<ProjectRole>().is_err());
    }
}
