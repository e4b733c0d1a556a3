use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error_response::ApiResult;
use crate::http::resolve_tenant_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MemoryInsertItem {
    pub thread_id: String,
    pub content: String,
    pub tags: Option<String>,
}

#[derive(Deserialize)]
pub struct MemoryInsertRequest {
    pub items: Vec<MemoryInsertItem>,
}

#[derive(Serialize)]
pub struct MemoryInsertResult {
    pub index: usize,
    pub success: bool,
    pub memory_id: Option<i64>,
    pub error: Option<String>,
}

/// POST /memory/insert — bulk-insert episodic long-term entries; each item
/// reports its own outcome rather than failing the whole batch (§6).
pub async fn memory_insert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<MemoryInsertRequest>,
) -> ApiResult<Json<Vec<MemoryInsertResult>>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;
    state.entities.require_active_tenant(&tenant_id)?;

    let results = req
        .items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            match state
                .memory
                .add_episodic_memory(&tenant_id, &item.thread_id, &item.content, item.tags.as_deref())
            {
                Ok(memory_id) => MemoryInsertResult {
                    index,
                    success: true,
                    memory_id: Some(memory_id),
                    error: None,
                },
                Err(e) => MemoryInsertResult {
                    index,
                    success: false,
                    memory_id: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();

    Ok(Json(results))
}

#[derive(Deserialize)]
pub struct MemoryDeleteRequest {
    pub thread_id: String,
    pub memory_id: i64,
}

/// POST /memory/delete — deletes one episodic entry (§6).
pub async fn memory_delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<MemoryDeleteRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;
    state
        .memory
        .delete_episodic(&tenant_id, &req.thread_id, req.memory_id)?;
    Ok(Json(serde_json::json!({"deleted": true})))
}
