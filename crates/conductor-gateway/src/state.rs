use std::sync::Arc;

use chrono::{DateTime, Utc};
use conductor_core::config::ConductorConfig;
use conductor_entities::EntityStore;
use conductor_memory::MemoryStore;
use conductor_tasks::{AwakeningScanner, PreservationJob};
use conductor_workflow::{Agent, Engine};
use dashmap::DashMap;
use serde::Serialize;

/// Status of a background (`/runs/async`) workflow dispatch. The conceptual
/// `workflow_runs` outbox table (§6) is represented here as an in-memory map;
/// it is not part of the durable core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub status: RunStatus,
    pub thread_id: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Central shared state for every Axum handler (mirrors the base workspace's
/// `AppState` composition pattern).
pub struct AppState {
    pub config: ConductorConfig,
    pub entities: Arc<EntityStore>,
    pub memory: Arc<MemoryStore>,
    pub engine: Arc<Engine>,
    pub sentiment_agent: Arc<dyn Agent>,
    pub intent_agent: Arc<dyn Agent>,
    pub sales_agent: Arc<dyn Agent>,
    pub awakening: Arc<AwakeningScanner>,
    pub preservation: Arc<PreservationJob>,
    pub http_client: reqwest::Client,
    /// `run_id` -> status, for the `/runs/{run_id}/status` poll path.
    pub runs: DashMap<String, RunRecord>,
    /// Threads a preservation job has already been scheduled for — "at most
    /// one job per thread" (§4.5b) enforced at the call site since
    /// `PreservationJob` itself is stateless per schedule() call.
    pub preservation_scheduled: DashMap<String, ()>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ConductorConfig,
        entities: Arc<EntityStore>,
        memory: Arc<MemoryStore>,
        engine: Arc<Engine>,
        sentiment_agent: Arc<dyn Agent>,
        intent_agent: Arc<dyn Agent>,
        sales_agent: Arc<dyn Agent>,
        awakening: Arc<AwakeningScanner>,
        preservation: Arc<PreservationJob>,
    ) -> Self {
        Self {
            config,
            entities,
            memory,
            engine,
            sentiment_agent,
            intent_agent,
            sales_agent,
            awakening,
            preservation,
            http_client: reqwest::Client::new(),
            runs: DashMap::new(),
            preservation_scheduled: DashMap::new(),
        }
    }

    /// Schedules conversation preservation for `thread_id` the first time
    /// it's called for that thread; subsequent calls are a no-op (§4.5b).
    pub fn schedule_preservation_once(&self, tenant_id: String, thread_id: String) {
        if self.preservation_scheduled.insert(thread_id.clone(), ()).is_none() {
            self.preservation.clone().schedule(tenant_id, thread_id);
        }
    }

    /// Builds the configured workflow topology (§4.4), cloning the three
    /// already-shared agent handles.
    pub fn build_graph(&self) -> conductor_workflow::WorkflowGraph {
        if self.config.workflow.enable_parallel_execution {
            conductor_workflow::WorkflowGraph::core_chat_parallel(
                self.sentiment_agent.clone(),
                self.intent_agent.clone(),
                self.sales_agent.clone(),
            )
        } else {
            conductor_workflow::WorkflowGraph::core_chat_sequential(
                self.sentiment_agent.clone(),
                self.intent_agent.clone(),
                self.sales_agent.clone(),
            )
        }
    }
}
