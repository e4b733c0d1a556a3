use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use conductor_core::types::{AssistantId, EntityStatus};
use conductor_entities::{Assistant, Tenant};

use crate::error_response::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TenantSyncRequest {
    pub tenant_id: String,
}

/// POST /tenants/sync — creates/updates a Tenant (§6).
pub async fn tenant_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TenantSyncRequest>,
) -> ApiResult<Json<Tenant>> {
    let tenant = state.entities.sync_tenant(&req.tenant_id)?;
    Ok(Json(tenant))
}

#[derive(Deserialize)]
pub struct AssistantSyncRequest {
    pub assistant_id: Option<String>,
    pub tenant_id: String,
    pub name: String,
    pub occupation: Option<String>,
    pub personality: Option<String>,
    pub industry: Option<String>,
    pub voice_id: Option<String>,
}

/// POST /assistants/sync — not in the distilled route table, but the Data
/// Model requires an Assistant to exist before any Thread can bind to one;
/// the spec calls its route list "representative", so this fills the gap
/// the same way `/tenants/sync` does for Tenant.
pub async fn assistant_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AssistantSyncRequest>,
) -> ApiResult<Json<Assistant>> {
    state.entities.require_active_tenant(&req.tenant_id)?;
    let assistant_id = req
        .assistant_id
        .map(|id| AssistantId::from(id.as_str()))
        .unwrap_or_else(AssistantId::new);
    let assistant = state.entities.upsert_assistant(Assistant {
        assistant_id,
        tenant_id: req.tenant_id,
        status: EntityStatus::Active,
        name: req.name,
        occupation: req.occupation,
        personality: req.personality,
        industry: req.industry,
        voice_id: req.voice_id,
    })?;
    Ok(Json(assistant))
}
