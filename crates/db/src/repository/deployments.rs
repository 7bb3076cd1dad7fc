//! Deployment version store.
//!
//! Versions are append-only snapshots of a workflow graph.  Only `name` and
//! `is_active` ever change after insert, and at most one version per workflow
//! is active.  Activation is a single transaction whose first statement is a
//! write, so concurrent activations queue on the SQLite write lock (the pool
//! sets a busy timeout) instead of interleaving.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{DeploymentVersionRow, DeploymentVersionSummary};
use crate::repository::workflows::get_workflow;
use crate::{DbError, DbPool};

/// Longest accepted version name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

const VERSION_COLUMNS: &str =
    "id, workflow_id, version, name, state, is_active, created_by, created_at";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Every version of `workflow_id`, newest first, with the creator's display
/// name when the creator is a known user.
pub async fn list(pool: &DbPool, workflow_id: Uuid) -> Result<Vec<DeploymentVersionSummary>, DbError> {
    let rows = sqlx::query_as::<_, DeploymentVersionSummary>(
        r#"
        SELECT v.id, v.version, v.name, v.is_active, v.created_at, v.created_by,
               u.name AS deployed_by
        FROM workflow_deployment_versions v
        LEFT JOIN users u ON u.id = v.created_by
        WHERE v.workflow_id = ?
        ORDER BY v.version DESC
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// One version including its snapshot.
pub async fn get(pool: &DbPool, workflow_id: Uuid, version: i64) -> Result<DeploymentVersionRow, DbError> {
    sqlx::query_as::<_, DeploymentVersionRow>(&format!(
        "SELECT {VERSION_COLUMNS} FROM workflow_deployment_versions WHERE workflow_id = ? AND version = ?"
    ))
    .bind(workflow_id)
    .bind(version)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::VersionNotFound { workflow_id, version })
}

/// The live version, if the workflow has ever been deployed.
pub async fn get_active(pool: &DbPool, workflow_id: Uuid) -> Result<Option<DeploymentVersionRow>, DbError> {
    let row = sqlx::query_as::<_, DeploymentVersionRow>(&format!(
        "SELECT {VERSION_COLUMNS} FROM workflow_deployment_versions WHERE workflow_id = ? AND is_active = 1"
    ))
    .bind(workflow_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Append a new version holding `state` and make it the active one.
///
/// The version number is `max + 1` for the workflow, computed inside the
/// insert itself.
pub async fn deploy(
    pool: &DbPool,
    workflow_id: Uuid,
    state: &Value,
    created_by: Option<&str>,
    name: Option<&str>,
) -> Result<DeploymentVersionRow, DbError> {
    let name = name.map(validate_name).transpose()?;
    get_workflow(pool, workflow_id).await?;

    let mut tx = pool.begin().await?;
    let version: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO workflow_deployment_versions
            (id, workflow_id, version, name, state, is_active, created_by, created_at)
        SELECT ?, ?, COALESCE(MAX(version), 0) + 1, ?, ?, 0, ?, ?
        FROM workflow_deployment_versions
        WHERE workflow_id = ?
        RETURNING version
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(workflow_id)
    .bind(name.as_deref())
    .bind(Json(state))
    .bind(created_by)
    .bind(Utc::now())
    .bind(workflow_id)
    .fetch_one(&mut *tx)
    .await?;

    match activate_in(&mut tx, workflow_id, version).await {
        Ok(_) => tx.commit().await?,
        Err(err) => {
            tx.rollback().await?;
            return Err(err);
        }
    }

    info!(%workflow_id, version, "workflow deployed");
    get(pool, workflow_id, version).await
}

/// Make `version` the single active version of `workflow_id` and mark the
/// workflow deployed.  Returns the new `deployed_at`.
///
/// All three steps commit together or not at all; an unknown version leaves
/// the previously active version untouched.
pub async fn activate(pool: &DbPool, workflow_id: Uuid, version: i64) -> Result<DateTime<Utc>, DbError> {
    let mut tx = pool.begin().await?;

    match activate_in(&mut tx, workflow_id, version).await {
        Ok(deployed_at) => {
            tx.commit().await?;
            info!(%workflow_id, version, "deployment version activated");
            Ok(deployed_at)
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err)
        }
    }
}

async fn activate_in(
    conn: &mut SqliteConnection,
    workflow_id: Uuid,
    version: i64,
) -> Result<DateTime<Utc>, DbError> {
    // Deactivate first so the one-active index is never violated mid-way.
    let cleared = sqlx::query(
        "UPDATE workflow_deployment_versions SET is_active = 0 WHERE workflow_id = ? AND is_active = 1",
    )
    .bind(workflow_id)
    .execute(&mut *conn)
    .await?;
    debug!(%workflow_id, cleared = cleared.rows_affected(), "previous active version cleared");

    let activated = sqlx::query(
        "UPDATE workflow_deployment_versions SET is_active = 1 WHERE workflow_id = ? AND version = ?",
    )
    .bind(workflow_id)
    .bind(version)
    .execute(&mut *conn)
    .await?;
    if activated.rows_affected() == 0 {
        return Err(DbError::VersionNotFound { workflow_id, version });
    }

    let deployed_at = Utc::now();
    let marked = sqlx::query("UPDATE workflows SET is_deployed = 1, deployed_at = ? WHERE id = ?")
        .bind(deployed_at)
        .bind(workflow_id)
        .execute(&mut *conn)
        .await?;
    if marked.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(deployed_at)
}

/// Set a version's display name.  Setting the current name again succeeds.
pub async fn rename(pool: &DbPool, workflow_id: Uuid, version: i64, name: &str) -> Result<String, DbError> {
    let name = validate_name(name)?;

    let result = sqlx::query(
        "UPDATE workflow_deployment_versions SET name = ? WHERE workflow_id = ? AND version = ?",
    )
    .bind(&name)
    .bind(workflow_id)
    .bind(version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::VersionNotFound { workflow_id, version });
    }

    Ok(name)
}

/// Trim `name` and check its length in characters.
pub fn validate_name(name: &str) -> Result<String, DbError> {
    let trimmed = name.trim();
    let chars = trimmed.chars().count();
    if chars == 0 {
        return Err(DbError::Validation("name must not be empty".to_owned()));
    }
    if chars > MAX_NAME_CHARS {
        return Err(DbError::Validation(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_owned())
}
