//! KaaS API library
//!
//! Project and namespace orchestration for tenant workspaces: keeps the
//! metadata store and each workspace's isolated cluster in line.

// Core modules
pub mod config;
pub mod logging;
pub mod shutdown;
pub mod validation;

// Persistence
pub mod activity;
pub mod db;

// Cluster projection
pub mod kubernetes;

// Service
pub mod project;

pub use project::ProjectService;
