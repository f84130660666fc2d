//! Input validation for project, namespace and membership requests

use kaas_common::{Error, ProjectRole, ResourceQuota};
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_DNS_LABEL_LENGTH: usize = 63;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_EMAIL_LENGTH: usize = 320;

/// RFC 1123 label: lowercase alphanumerics and hyphens, no leading/trailing hyphen
static DNS_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap()
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Kubernetes quantity: decimal with optional binary/decimal suffix or exponent
static QUANTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(\.[0-9]+)?(m|k|M|G|T|P|E|Ki|Mi|Gi|Ti|Pi|Ei|[eE][0-9]+)?$").unwrap()
});

/// Validation result type
pub type ValidationResult<T> = Result<T, Error>;

/// Whether `name` can be used as a project or namespace name
pub fn is_valid_project_name(name: &str) -> bool {
    name.len() <= MAX_DNS_LABEL_LENGTH && DNS_LABEL_REGEX.is_match(name)
}

pub fn validate_project_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(Error::Validation("project name cannot be empty".to_string()));
    }

    if !is_valid_project_name(name) {
        return Err(Error::Validation(format!(
            "invalid project name '{}': must be lowercase alphanumeric or '-', start and end with an alphanumeric character, and be at most {} characters",
            name, MAX_DNS_LABEL_LENGTH
        )));
    }

    Ok(())
}

pub fn validate_namespace_name(name: &str) -> ValidationResult<()> {
    if !is_valid_project_name(name) {
        return Err(Error::Validation(format!("invalid namespace name '{}'", name)));
    }
    Ok(())
}

pub fn validate_display_name(display_name: &str) -> ValidationResult<()> {
    if display_name.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "display name too long (max {} characters)",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> ValidationResult<()> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::Validation(format!(
            "description too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    if email.is_empty() {
        return Err(Error::Validation("email cannot be empty".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(Error::Validation(format!("invalid email address '{}'", email)));
    }

    Ok(())
}

/// Parse a role string from a request
pub fn validate_role(role: &str) -> ValidationResult<ProjectRole> {
    role.parse()
}

fn validate_quantity(field: &str, value: &Option<String>) -> ValidationResult<()> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(v) if QUANTITY_REGEX.is_match(v) => Ok(()),
        Some(v) => Err(Error::Validation(format!(
            "invalid {} quantity '{}'",
            field, v
        ))),
    }
}

/// Validate every quantity in a quota
pub fn validate_resource_quota(quota: &ResourceQuota) -> ValidationResult<()> {
    validate_quantity("cpu", &quota.cpu)?;
    validate_quantity("memory", &quota.memory)?;
    validate_quantity("storage", &quota.storage)?;
    Ok(())
}
