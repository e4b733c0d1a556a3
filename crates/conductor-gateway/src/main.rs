use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use conductor_agents::{CachedAssetsClient, IntentAgent, NullAssetsClient, SalesAgent, SentimentAgent};
use conductor_core::config::ConductorConfig;
use conductor_entities::EntityStore;
use conductor_llm::{HttpProvider, ProviderRouter, ProviderSlot};
use conductor_llm::{LongTermMemoryLookup, StoreEpisodicMemory, ToolRegistry};
use conductor_memory::MemoryStore;
use conductor_tasks::{AwakeningScanner, PreservationJob};
use conductor_workflow::{Agent, Engine};

use conductor_gateway::state::AppState;
use conductor_gateway::summarizer::LlmSummarizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("CONDUCTOR_CONFIG").ok();
    let config = ConductorConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        ConductorConfig::default()
    });

    let db_path = shellexpand_home(&config.database.path);
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let entities_conn = rusqlite::Connection::open(&db_path)?;
    conductor_entities::db::init_db(&entities_conn)?;
    let entities = Arc::new(EntityStore::new(Arc::new(std::sync::Mutex::new(entities_conn))));

    let memory_conn = rusqlite::Connection::open(&db_path)?;
    conductor_memory::db::init_db(&memory_conn)?;

    let provider: Arc<dyn conductor_llm::LlmProvider> = {
        let http = HttpProvider::new(
            config.llm.provider.clone(),
            config.llm.api_key.clone(),
            config
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        );
        Arc::new(ProviderRouter::new(vec![ProviderSlot::new(Box::new(http), 3)]))
    };

    let memory = Arc::new(MemoryStore::new(
        Arc::new(std::sync::Mutex::new(memory_conn)),
        config.memory.clone(),
        Arc::new(LlmSummarizer::new(provider.clone(), config.llm.model.clone())),
    ));

    let assets = Arc::new(CachedAssetsClient::new(NullAssetsClient));
    let tools = ToolRegistry::new(vec![
        Arc::new(LongTermMemoryLookup::new(memory.clone())),
        Arc::new(StoreEpisodicMemory::new(memory.clone())),
    ]);

    let sentiment_agent: Arc<dyn Agent> = Arc::new(SentimentAgent::new(
        provider.clone(),
        memory.clone(),
        config.llm.model.clone(),
    ));
    let intent_agent: Arc<dyn Agent> = Arc::new(IntentAgent::new(
        provider.clone(),
        assets,
        config.intent.clone(),
        config.llm.model.clone(),
    ));
    let sales_agent: Arc<dyn Agent> = Arc::new(SalesAgent::new(
        provider.clone(),
        memory.clone(),
        entities.clone(),
        tools,
        config.llm.model.clone(),
    ));

    let engine = Arc::new(Engine::new(entities.clone()));

    let awakening = Arc::new(AwakeningScanner::new(
        entities.clone(),
        memory.clone(),
        provider.clone(),
        config.tasks.clone(),
        config.llm.model.clone(),
    ));
    let preservation = Arc::new(PreservationJob::new(
        memory.clone(),
        provider.clone(),
        config.tasks.clone(),
        config.memory.clone(),
        config.llm.model.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(awakening.clone().run(shutdown_rx));
    tokio::spawn(memory_maintenance_loop(memory.clone(), shutdown_tx.subscribe()));

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(AppState::new(
        config,
        entities,
        memory,
        engine,
        sentiment_agent,
        intent_agent,
        sales_agent,
        awakening,
        preservation,
    ));
    let router = conductor_gateway::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("conductor gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Periodic sweep dropping long-term entries past their TTL (§4.1). Mirrors
/// `AwakeningScanner::run`'s tick-loop shape but has no per-iteration work to
/// report beyond the expiry count already logged inside the store.
async fn memory_maintenance_loop(memory: Arc<MemoryStore>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                memory.cleanup_expired_memories().await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

fn shellexpand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}
