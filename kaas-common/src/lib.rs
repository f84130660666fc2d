//! Common types shared between kaas-api and its callers
//!
//! Holds the tenant project data model, the project role ladder and the
//! error taxonomy every service operation reports through.

pub mod project;
pub mod roles;

pub use project::*;
pub use roles::{has_required_role, ProjectRole};

use std::fmt;

/// Why an access check refused a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDeniedReason {
    /// The user holds no membership in the project
    NotMember,
    /// The membership exists but is not active
    Inactive,
    /// The member's role ranks below the required one
    InsufficientRole { required: String, actual: String },
}

impl fmt::Display for AccessDeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDeniedReason::NotMember => write!(f, "user is not a project member"),
            AccessDeniedReason::Inactive => write!(f, "project membership is not active"),
            AccessDeniedReason::InsufficientRole { required, actual } => write!(
                f,
                "insufficient permissions: role '{}' does not satisfy '{}'",
                actual, required
            ),
        }
    }
}

/// Common error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// An entity exists but belongs to a different parent than the one used to address it
    #[error("Mismatch: {0}")]
    Mismatch(String),

    #[error("Access denied: {0}")]
    AccessDenied(AccessDeniedReason),

    /// Failure reported by the tenant cluster or while resolving its client
    #[error("Cluster error: {0}")]
    Adapter(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("System error: {0}")]
    System(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error comes from the live cluster side
    pub fn is_adapter(&self) -> bool {
        matches!(self, Error::Adapter(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_messages() {
        let err = Error::AccessDenied(AccessDeniedReason::NotMember);
        assert!(err.to_string().contains("user is not a project member"));

        let err = Error::AccessDenied(AccessDeniedReason::InsufficientRole {
            required: "admin".to_string(),
            actual: "viewer".to_string(),
        });
        assert!(err.to_string().contains("insufficient permissions"));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Adapter("boom".into()).is_adapter());
        assert!(!Error::Conflict("dup".into()).is_adapter());
        assert!(Error::NotFound("project".into()).is_not_found());
    }
}
