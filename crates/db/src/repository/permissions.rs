//! Workspace-scoped permissions.

use std::str::FromStr;

use crate::{models::PermissionLevel, DbError, DbPool};

/// Grant (or change) `user_id`'s level on `workspace_id`.
pub async fn grant(
    pool: &DbPool,
    workspace_id: &str,
    user_id: &str,
    level: PermissionLevel,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO permissions (workspace_id, user_id, level) VALUES (?, ?, ?)
        ON CONFLICT (workspace_id, user_id) DO UPDATE SET level = excluded.level
        "#,
    )
    .bind(workspace_id)
    .bind(user_id)
    .bind(level.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// The user's level on the workspace, `None` when they have no access.
pub async fn level_for(
    pool: &DbPool,
    workspace_id: &str,
    user_id: &str,
) -> Result<Option<PermissionLevel>, DbError> {
    let level: Option<String> =
        sqlx::query_scalar("SELECT level FROM permissions WHERE workspace_id = ? AND user_id = ?")
            .bind(workspace_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    level
        .map(|l| PermissionLevel::from_str(&l).map_err(DbError::Validation))
        .transpose()
}
