//! Tenant cluster resources
//!
//! Handles Namespaces, ResourceQuotas, RoleBindings and hierarchy anchors.

pub mod hierarchy;
pub mod namespaces;
pub mod quotas;
pub mod rbac;
