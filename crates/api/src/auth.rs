//! Caller identity and workspace permission checks.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;
use uuid::Uuid;

use db::models::{PermissionLevel, WorkflowRow};
use db::repository::{permissions, workflows};
use db::DbPool;

use crate::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user on whose behalf the request runs.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Caller { user_id: id.to_owned() })
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Load the workflow and check that `caller` holds at least `required` on
/// its workspace.
pub async fn authorize(
    pool: &DbPool,
    caller: &Caller,
    workflow_id: Uuid,
    required: PermissionLevel,
) -> Result<WorkflowRow, ApiError> {
    let workflow = workflows::get_workflow(pool, workflow_id).await?;
    let level = permissions::level_for(pool, &workflow.workspace_id, &caller.user_id).await?;

    match level {
        Some(level) if level >= required => Ok(workflow),
        _ => {
            warn!(
                user_id = %caller.user_id,
                %workflow_id,
                required = %required,
                "permission denied"
            );
            Err(ApiError::Forbidden)
        }
    }
}
