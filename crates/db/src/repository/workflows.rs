//! Workflow rows.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::{models::WorkflowRow, DbError, DbPool};

/// Insert a new, undeployed workflow owned by `workspace_id`.
pub async fn create_workflow(
    pool: &DbPool,
    name: &str,
    workspace_id: &str,
) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        INSERT INTO workflows (id, name, workspace_id, is_deployed, deployed_at, created_at)
        VALUES (?, ?, ?, 0, NULL, ?)
        RETURNING id, name, workspace_id, is_deployed, deployed_at, created_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(workspace_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    debug!(workflow_id = %id, "workflow created");
    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &DbPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, name, workspace_id, is_deployed, deployed_at, created_at
        FROM workflows
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::test_pool;

    #[tokio::test]
    async fn created_workflow_starts_undeployed() {
        let (pool, _dir) = test_pool().await;
        let created = create_workflow(&pool, "Lead intake", "ws-1").await.unwrap();

        let fetched = get_workflow(&pool, created.id).await.unwrap();
        assert_eq!(fetched.name, "Lead intake");
        assert_eq!(fetched.workspace_id, "ws-1");
        assert!(!fetched.is_deployed);
        assert!(fetched.deployed_at.is_none());
    }

    #[tokio::test]
    async fn missing_workflow_is_not_found() {
        let (pool, _dir) = test_pool().await;
        assert!(matches!(get_workflow(&pool, Uuid::new_v4()).await, Err(DbError::NotFound)));
    }
}
