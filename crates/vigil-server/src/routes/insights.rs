//! Insight queue endpoints.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
    CheckRequest, CheckResponse, EngagementLevel, QueueEntry, Resolution, ResolveOutcome,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for a poll; the workspace comes from the path.
#[derive(Debug, Deserialize)]
pub struct CheckBody {
    pub idle_seconds: u64,
    pub engagement: EngagementLevel,
    #[serde(default)]
    pub focus_mode_active: bool,
    #[serde(default)]
    pub deliver: bool,
}

/// Is there an insight to show right now?
/// POST /workspaces/:workspace_id/check
pub async fn check_insight(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<CheckBody>, JsonRejection>,
) -> ApiResult<Json<CheckResponse>> {
    let Path(workspace_id) = path?;
    let Json(body) = payload?;

    let mut request = CheckRequest::new(workspace_id, body.idle_seconds, body.engagement)
        .with_focus(body.focus_mode_active);
    request.deliver = body.deliver;

    Ok(Json(state.engine.check(request).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_resolved: bool,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub entries: Vec<QueueEntry>,
    pub pending: usize,
}

/// Entries of one workspace, best-ranked first.
/// GET /workspaces/:workspace_id/insights
pub async fn list_insights(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    let Path(workspace_id) = path?;
    let Query(query) = query?;

    let queue = state.engine.queue();
    let entries = queue.list(&workspace_id, query.include_resolved)?;
    let pending = queue.pending_count(&workspace_id)?;
    Ok(Json(ListResponse { entries, pending }))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub outcome: Resolution,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub outcome: ResolveOutcome,
}

/// Record delivered, dismissed or engaged.
/// POST /insights/:id/resolve
///
/// Unknown and already-resolved ids are reported in the body, not as
/// errors.
pub async fn resolve_insight(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<ResolveBody>, JsonRejection>,
) -> ApiResult<Json<ResolveResponse>> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let entry_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::bad_request(format!("Invalid insight id: {}", id)))?;

    let outcome = state.engine.resolve(entry_id, body.outcome).await?;
    Ok(Json(ResolveResponse { outcome }))
}
