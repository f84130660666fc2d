//! Metadata store backed by SQLite
//!
//! Holds projects, secondary namespaces, memberships, the activity trail and
//! the read-only user directory.

pub mod members;
pub mod migrations;
pub mod namespaces;
pub mod projects;
pub mod users;

use kaas_common::{Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a connection pool, creating the database file and its directory if needed
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if let Some(parent) = Path::new(path).parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::System(format!("Failed to create DB directory: {}", e))
                })?;
            }
        }

        let url = if database_url.contains(":memory:") || database_url.contains("mode=") {
            database_url.to_string()
        } else if database_url.contains('?') {
            format!("{}&mode=rwc", database_url)
        } else {
            format!("{}?mode=rwc", database_url)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .map_err(|e| Error::Database(format!("Database connection failed: {}", e)))?;

        tracing::info!("Database connection established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database connection closed");
    }
}

/// Map a sqlx error, turning unique-constraint violations into conflicts
pub(crate) fn map_db_error(context: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::Conflict(format!("{}: {}", context, db_err.message()))
        }
        sqlx::Error::RowNotFound => Error::NotFound(context.to_string()),
        other => Error::Database(format!("{}: {}", context, other)),
    }
}

/// Read a typed column from a row
pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| Error::Database(format!("Failed to read column {}: {}", name, e)))
}

/// Decode a JSON text column
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Database(format!("Corrupt JSON in column {}: {}", column, e)))
}

/// Escape LIKE wildcards in user-supplied search text
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Single-connection in-memory database with migrations applied
    pub async fn memory_db() -> Database {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Database::from_pool(pool);
        db.migrate().await.unwrap();
        db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("billing"), "%billing%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = test_support::memory_db().await;
        db.migrate().await.unwrap();

        use sqlx::Row;
        let row = sqlx::query("SELECT COUNT(*) AS count FROM migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let count: i64 = row.get("count");
        assert_eq!(count as usize, migrations::MIGRATIONS.len());
    }
}
