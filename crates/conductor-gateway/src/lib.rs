pub mod auth;
pub mod error_response;
pub mod http;
pub mod state;
pub mod summarizer;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Assemble the full Axum router. Every route except `/health` is behind the
/// bearer-JWT middleware (a no-op when auth mode is `none`, §6).
pub fn build_router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/tenants/sync", post(http::tenants::tenant_sync))
        .route("/assistants/sync", post(http::tenants::assistant_sync))
        .route("/threads", post(http::threads::create_thread))
        .route("/threads/{thread_id}/runs/wait", post(http::threads::run_wait))
        .route("/threads/{thread_id}/runs/async", post(http::threads::run_async))
        .route(
            "/threads/{thread_id}/runs/{run_id}/status",
            post(http::threads::run_status),
        )
        .route(
            "/threads/{thread_id}/memory/append",
            post(http::threads::append_memory),
        )
        .route("/memory/insert", post(http::memory::memory_insert))
        .route("/memory/delete", post(http::memory::memory_delete))
        .route("/videos", post(http::videos::enqueue_video))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(http::health::health_handler))
        .merge(authenticated)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
