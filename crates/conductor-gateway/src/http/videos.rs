use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error_response::ApiResult;
use crate::http::resolve_tenant_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VideoRequest {
    pub thread_id: String,
    pub prompt: String,
}

#[derive(Serialize)]
pub struct VideoAccepted {
    pub session_id: String,
    pub status: &'static str,
}

/// POST /videos — enqueues an external video-gen task; explicitly "not part
/// of core" (§6), so this just records the tenant scope and hands back an
/// accepted receipt without touching WGE/MS.
pub async fn enqueue_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<VideoRequest>,
) -> ApiResult<Json<VideoAccepted>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;
    state.entities.require_active_tenant(&tenant_id)?;
    tracing::info!(
        tenant_id,
        thread_id = %req.thread_id,
        prompt_len = req.prompt.len(),
        "video generation enqueued (outside core)"
    );
    Ok(Json(VideoAccepted {
        session_id: Uuid::new_v4().to_string(),
        status: "queued",
    }))
}
