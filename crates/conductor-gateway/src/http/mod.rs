pub mod health;
pub mod memory;
pub mod tenants;
pub mod threads;
pub mod videos;

use axum::http::HeaderMap;

use crate::error_response::ApiError;
use conductor_core::ConductorError;

/// Resolves the acting tenant from `X-Tenant-ID` or a path-supplied value,
/// per §6 ("All routes are tenant-scoped via X-Tenant-ID header or
/// /tenants/{tenant_id}/... path").
pub fn resolve_tenant_id(headers: &HeaderMap, path_tenant: Option<&str>) -> Result<String, ApiError> {
    if let Some(t) = path_tenant {
        if !t.is_empty() {
            return Ok(t.to_string());
        }
    }
    headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ApiError(ConductorError::validation(
                "missing tenant scope: set X-Tenant-ID header or use /tenants/{tenant_id}/... path",
            ))
        })
}
