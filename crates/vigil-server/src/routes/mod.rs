//! Route definitions for the REST API.

mod detect;
mod exchanges;
mod health;
mod insights;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Detection
        .route("/detect", post(detect::detect_signals))
        .route("/exchanges", post(exchanges::ingest_exchange))
        // Queue
        .route("/workspaces/:workspace_id/check", post(insights::check_insight))
        .route("/workspaces/:workspace_id/insights", get(insights::list_insights))
        .route("/insights/:id/resolve", post(insights::resolve_insight))
        // Attach state
        .with_state(state)
}

pub use detect::*;
pub use exchanges::*;
pub use health::*;
pub use insights::*;
