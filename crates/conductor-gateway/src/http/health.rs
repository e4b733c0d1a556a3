use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

/// GET /health — unauthenticated liveness probe (§6).
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "auth_mode": format!("{:?}", state.config.gateway.auth.mode),
        "parallel_execution": state.config.workflow.enable_parallel_execution,
        "active_runs": state.runs.len(),
    }))
}
