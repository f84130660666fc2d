//! Database migrations

use kaas_common::{Error, Result};
use sqlx::SqlitePool;

/// Ordered migration list; names are recorded once applied
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_create_users_table", MIGRATION_001_CREATE_USERS),
    ("002_create_projects_table", MIGRATION_002_CREATE_PROJECTS),
    ("003_create_namespaces_table", MIGRATION_003_CREATE_NAMESPACES),
    ("004_create_project_members_table", MIGRATION_004_CREATE_PROJECT_MEMBERS),
    ("005_create_project_activities_table", MIGRATION_005_CREATE_PROJECT_ACTIVITIES),
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("Failed to create migrations table: {}", e)))?;

    for (name, sql) in MIGRATIONS {
        run_migration(pool, name, sql).await?;
    }

    Ok(())
}

async fn run_migration(pool: &SqlitePool, name: &str, sql: &str) -> Result<()> {
    use sqlx::Row;

    let row = sqlx::query("SELECT COUNT(*) as count FROM migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Database(format!("Migration check failed: {}", e)))?;

    let count: i64 = row.get("count");
    if count > 0 {
        tracing::debug!("Migration {} already applied", name);
        return Ok(());
    }

    tracing::info!("Running migration: {}", name);

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::Database(format!("Migration {} failed: {}", name, e)))?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Migration {} failed: {}", name, e)))?;

    sqlx::query("INSERT INTO migrations (name) VALUES (?)")
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to record migration: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| Error::Database(format!("Migration {} failed: {}", name, e)))?;

    tracing::info!("Migration {} completed", name);

    Ok(())
}

const MIGRATION_001_CREATE_USERS: &str = "
CREATE TABLE users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

const MIGRATION_002_CREATE_PROJECTS: &str = "
CREATE TABLE projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    workspace_id TEXT NOT NULL,
    parent_id TEXT,
    namespace_name TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    settings TEXT NOT NULL DEFAULT '{}',
    resource_quota TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (workspace_id, name)
);
CREATE INDEX idx_projects_parent ON projects(parent_id);
CREATE INDEX idx_projects_status ON projects(status);
";

const MIGRATION_003_CREATE_NAMESPACES: &str = "
CREATE TABLE namespaces (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    project_id TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    resource_quota TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project_id, name)
);
";

const MIGRATION_004_CREATE_PROJECT_MEMBERS: &str = "
CREATE TABLE project_members (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    user_email TEXT NOT NULL,
    user_name TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    added_by TEXT NOT NULL DEFAULT '',
    added_at TEXT NOT NULL,
    UNIQUE (project_id, user_id)
);
CREATE INDEX idx_project_members_user ON project_members(user_id);
";

// No foreign key to projects: entries outlive the project they describe.
const MIGRATION_005_CREATE_PROJECT_ACTIVITIES: &str = "
CREATE TABLE project_activities (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    user_id TEXT NOT NULL DEFAULT '',
    user_email TEXT NOT NULL DEFAULT '',
    user_name TEXT NOT NULL DEFAULT '',
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
CREATE INDEX idx_project_activities_project ON project_activities(project_id, created_at);
CREATE INDEX idx_project_activities_created ON project_activities(created_at);
";
