//! User rows.  Users are owned by the upstream identity system; this table
//! only mirrors display names.

use crate::{models::UserRow, DbError, DbPool};

/// Insert or refresh a user's display name.
pub async fn upsert_user(pool: &DbPool, id: &str, name: &str) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, name) VALUES (?, ?)
        ON CONFLICT (id) DO UPDATE SET name = excluded.name
        RETURNING id, name
        "#,
    )
    .bind(id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::test_pool;

    #[tokio::test]
    async fn upsert_replaces_display_name() {
        let (pool, _dir) = test_pool().await;
        upsert_user(&pool, "u-1", "Ada").await.unwrap();
        let row = upsert_user(&pool, "u-1", "Ada Lovelace").await.unwrap();
        assert_eq!(row.name, "Ada Lovelace");

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.unwrap();
        assert_eq!(rows, 1);
    }
}
