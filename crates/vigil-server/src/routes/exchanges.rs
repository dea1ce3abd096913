//! Exchange ingestion endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::Serialize;
use vigil_core::{Exchange, QueueEntry};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub entries: Vec<QueueEntry>,
}

/// Detect, schedule and enqueue one completed exchange.
/// POST /exchanges
pub async fn ingest_exchange(
    State(state): State<AppState>,
    payload: Result<Json<Exchange>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let Json(exchange) = payload?;
    let entries = state.engine.ingest_exchange(exchange).await?;
    let status = if entries.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(IngestResponse { entries })))
}
