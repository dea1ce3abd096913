//! Stateless detection endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use vigil_core::{ScheduledInsight, Signal, SignalSource};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub text: String,
    #[serde(default)]
    pub source_conversation_id: Option<String>,
    /// Also return the surface time of each signal.
    #[serde(default)]
    pub schedule: bool,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub signals: Vec<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<Vec<ScheduledInsight>>,
}

/// Detect signals in a piece of text without queueing anything.
/// POST /detect
pub async fn detect_signals(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let Json(request) = payload?;
    let source = request
        .source_conversation_id
        .map(SignalSource::new)
        .unwrap_or_default();

    let signals = state.engine.detect(&request.text, &source, Utc::now());
    let scheduled = request.schedule.then(|| {
        signals
            .iter()
            .cloned()
            .map(|signal| state.engine.schedule(signal))
            .collect()
    });

    Ok(Json(DetectResponse { signals, scheduled }))
}
