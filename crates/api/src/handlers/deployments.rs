//! Deployment version handlers.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use db::models::{DeploymentVersionRow, PermissionLevel};
use db::repository::deployments as versions;
use engine::{check_references, WorkflowGraph};

use crate::auth::{authorize, Caller};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct DeployBody {
    pub state: Value,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    #[serde(default)]
    pub name: Option<String>,
}

// GET /workflows/:id/deployments
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(workflow_id) = path?;
    authorize(&state.pool, &caller, workflow_id, PermissionLevel::Read).await?;
    let rows = versions::list(&state.pool, workflow_id).await?;
    Ok(Json(json!({ "versions": rows })))
}

// POST /workflows/:id/deployments
pub async fn deploy(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<DeployBody>, JsonRejection>,
) -> Result<(StatusCode, Json<DeploymentVersionRow>), ApiError> {
    let Path(workflow_id) = path?;
    let Json(body) = body?;
    authorize(&state.pool, &caller, workflow_id, PermissionLevel::Write).await?;

    // Snapshots must at least load as a graph with consistent references;
    // cycles are allowed here and rejected when a run starts.
    let graph: WorkflowGraph = serde_json::from_value(body.state.clone())
        .map_err(|e| ApiError::BadRequest(format!("invalid workflow state: {e}")))?;
    check_references(&graph).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let row = versions::deploy(
        &state.pool,
        workflow_id,
        &body.state,
        Some(&caller.user_id),
        body.name.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

// GET /workflows/:id/deployments/:version
pub async fn get(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<(Uuid, i64)>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path((workflow_id, version)) = path?;
    authorize(&state.pool, &caller, workflow_id, PermissionLevel::Read).await?;
    let row = versions::get(&state.pool, workflow_id, version).await?;
    Ok(Json(json!({ "deployedState": row.state.0 })))
}

// PATCH /workflows/:id/deployments/:version
pub async fn rename(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<(Uuid, i64)>, PathRejection>,
    body: Result<Json<RenameBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path((workflow_id, version)) = path?;
    let Json(body) = body?;
    authorize(&state.pool, &caller, workflow_id, PermissionLevel::Write).await?;
    let name = body
        .name
        .ok_or_else(|| ApiError::BadRequest("name is required".to_owned()))?;
    let name = versions::rename(&state.pool, workflow_id, version, &name).await?;
    Ok(Json(json!({ "name": name })))
}

// POST /workflows/:id/deployments/:version/activate
pub async fn activate(
    State(state): State<AppState>,
    caller: Caller,
    path: Result<Path<(Uuid, i64)>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path((workflow_id, version)) = path?;
    authorize(&state.pool, &caller, workflow_id, PermissionLevel::Write).await?;
    let deployed_at = versions::activate(&state.pool, workflow_id, version).await?;
    Ok(Json(json!({ "success": true, "deployedAt": deployed_at })))
}
