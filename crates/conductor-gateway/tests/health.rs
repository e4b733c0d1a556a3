// End-to-end smoke tests against the assembled router, the same level the
// base workspace's protocol wire tests operate at, but through axum's
// service interface instead of a raw serde round-trip.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use conductor_agents::{CachedAssetsClient, IntentAgent, NullAssetsClient, SalesAgent, SentimentAgent};
use conductor_core::config::ConductorConfig;
use conductor_entities::EntityStore;
use conductor_gateway::state::AppState;
use conductor_llm::{ChatRequest, ChatResponse, LlmError, LlmProvider, ToolRegistry};
use conductor_memory::{MemoryStore, Summarizer};
use conductor_tasks::{AwakeningScanner, PreservationJob};
use conductor_workflow::{Agent, Engine};
use tower::ServiceExt;

struct UnreachableProvider;

#[async_trait]
impl LlmProvider for UnreachableProvider {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, LlmError> {
        Err(LlmError::Unavailable("no provider configured in this test".into()))
    }
}

struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _tenant_id: &str, _thread_id: &str, _messages: &[conductor_core::types::Message]) -> Result<String, String> {
        Ok(String::new())
    }
}

fn test_state() -> Arc<AppState> {
    let config = ConductorConfig::default();

    let entities_conn = rusqlite::Connection::open_in_memory().unwrap();
    conductor_entities::db::init_db(&entities_conn).unwrap();
    let entities = Arc::new(EntityStore::new(Arc::new(std::sync::Mutex::new(entities_conn))));

    let memory_conn = rusqlite::Connection::open_in_memory().unwrap();
    conductor_memory::db::init_db(&memory_conn).unwrap();
    let provider: Arc<dyn LlmProvider> = Arc::new(UnreachableProvider);
    let memory = Arc::new(MemoryStore::new(
        Arc::new(std::sync::Mutex::new(memory_conn)),
        config.memory.clone(),
        Arc::new(NoopSummarizer),
    ));

    let assets = Arc::new(CachedAssetsClient::new(NullAssetsClient));
    let tools = ToolRegistry::new(vec![]);

    let sentiment_agent: Arc<dyn Agent> = Arc::new(SentimentAgent::new(provider.clone(), memory.clone(), "test-model"));
    let intent_agent: Arc<dyn Agent> = Arc::new(IntentAgent::new(provider.clone(), assets, config.intent.clone(), "test-model"));
    let sales_agent: Arc<dyn Agent> = Arc::new(SalesAgent::new(provider.clone(), memory.clone(), entities.clone(), tools, "test-model"));

    let engine = Arc::new(Engine::new(entities.clone()));
    let awakening = Arc::new(AwakeningScanner::new(entities.clone(), memory.clone(), provider.clone(), config.tasks.clone(), "test-model"));
    let preservation = Arc::new(PreservationJob::new(memory.clone(), provider, config.tasks.clone(), config.memory.clone(), "test-model"));

    Arc::new(AppState::new(
        config,
        entities,
        memory,
        engine,
        sentiment_agent,
        intent_agent,
        sales_agent,
        awakening,
        preservation,
    ))
}

#[tokio::test]
async fn health_is_reachable_without_auth() {
    let router = conductor_gateway::build_router(test_state());
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_sync_missing_id_is_rejected() {
    let router = conductor_gateway::build_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tenants/sync")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    // missing `tenant_id` field fails JSON extraction before the handler runs
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn tenant_sync_then_thread_create_round_trip() {
    let router = conductor_gateway::build_router(test_state());

    let sync = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tenants/sync")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"tenant_id":"tenant-a"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(sync.status(), StatusCode::OK);

    let create = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/threads")
                .header("content-type", "application/json")
                .header("x-tenant-id", "tenant-a")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_tenant_scope_is_rejected_on_thread_create() {
    let router = conductor_gateway::build_router(test_state());
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/threads")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
