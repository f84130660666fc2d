//! Read access to the user directory

use super::{column, map_db_error};
use kaas_common::{Result, User};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, email, display_name FROM users WHERE email = ? COLLATE NOCASE")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to look up user by email", e))?;

    row.as_ref().map(row_to_user).transpose()
}

pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, email, display_name FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_db_error("Failed to look up user", e))?;

    row.as_ref().map(row_to_user).transpose()
}

/// Insert or refresh a directory entry.
///
/// The directory is owned by the identity service; this exists for seeding.
pub async fn upsert(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, email, display_name) VALUES (?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET email = excluded.email, display_name = excluded.display_name",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.display_name)
    .execute(pool)
    .await
    .map_err(|e| map_db_error("Failed to store user", e))?;

    Ok(())
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: column(row, "id")?,
        email: column(row, "email")?,
        display_name: column(row, "display_name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    #[tokio::test]
    async fn test_lookup_by_email_is_case_insensitive() {
        let db = memory_db().await;
        let user = User {
            id: "u1".into(),
            email: "Alice@Example.com".into(),
            display_name: "Alice".into(),
        };
        upsert(db.pool(), &user).await.unwrap();

        let found = find_by_email(db.pool(), "alice@example.com").await.unwrap();
        assert_eq!(found, Some(user.clone()));
        assert_eq!(find(db.pool(), "u1").await.unwrap(), Some(user));
        assert!(find_by_email(db.pool(), "bob@example.com").await.unwrap().is_none());
    }
}
