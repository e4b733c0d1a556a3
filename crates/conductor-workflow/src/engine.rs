use std::collections::HashSet;
use std::sync::Arc;

use conductor_core::types::{AssistantId, ThreadId};
use conductor_entities::EntityStore;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tracing::{error, info, instrument, warn};

use crate::agent::Agent;
use crate::error::Result;
use crate::state::WorkflowState;

/// One node in the graph: an agent plus the names of the nodes that must
/// have committed before it can run.
pub struct Node {
    pub name: String,
    pub agent: Arc<dyn Agent>,
    pub depends_on: Vec<String>,
}

/// A declared DAG of agent nodes (§4.4).
pub struct WorkflowGraph {
    pub nodes: Vec<Node>,
}

impl WorkflowGraph {
    /// The core chat workflow: `sentiment` and `intent` run in parallel off
    /// START, `sales` waits on both.
    pub fn core_chat_parallel(
        sentiment: Arc<dyn Agent>,
        intent: Arc<dyn Agent>,
        sales: Arc<dyn Agent>,
    ) -> Self {
        Self {
            nodes: vec![
                Node {
                    name: "sentiment".to_string(),
                    agent: sentiment,
                    depends_on: vec![],
                },
                Node {
                    name: "intent".to_string(),
                    agent: intent,
                    depends_on: vec![],
                },
                Node {
                    name: "sales".to_string(),
                    agent: sales,
                    depends_on: vec!["sentiment".to_string(), "intent".to_string()],
                },
            ],
        }
    }

    /// Feature-flagged sequential topology: `sentiment → intent → sales`.
    /// Structurally equivalent results to the parallel graph for any field
    /// whose reducer is associative and commutative (§4.4).
    pub fn core_chat_sequential(
        sentiment: Arc<dyn Agent>,
        intent: Arc<dyn Agent>,
        sales: Arc<dyn Agent>,
    ) -> Self {
        Self {
            nodes: vec![
                Node {
                    name: "sentiment".to_string(),
                    agent: sentiment,
                    depends_on: vec![],
                },
                Node {
                    name: "intent".to_string(),
                    agent: intent,
                    depends_on: vec!["sentiment".to_string()],
                },
                Node {
                    name: "sales".to_string(),
                    agent: sales,
                    depends_on: vec!["intent".to_string()],
                },
            ],
        }
    }
}

/// Runs declared graphs against a shared `EntityStore` for the permission
/// prelude (§4.4). `run`/`dispatch` are thin callers over `execute`.
pub struct Engine {
    entities: Arc<EntityStore>,
}

impl Engine {
    pub fn new(entities: Arc<EntityStore>) -> Self {
        Self { entities }
    }

    /// Verifies the thread/assistant/tenant invariants, transitions the
    /// thread to BUSY, runs the graph, then releases BUSY to ACTIVE or
    /// FAILED depending on outcome (§4.4 permission prelude).
    #[instrument(skip(self, graph, state))]
    async fn execute_with_prelude(
        &self,
        graph: WorkflowGraph,
        mut state: WorkflowState,
    ) -> Result<WorkflowState> {
        let thread_id = state.thread_id.as_str().to_string();
        let tenant_id = state.tenant_id.clone();
        let assistant_id = state.assistant_id.clone();

        self.entities
            .require_active_assistant_in_tenant(assistant_id.as_str(), &tenant_id)?;
        let thread = self
            .entities
            .try_acquire_busy(&thread_id, &tenant_id, &assistant_id)?;
        if let Some(bound) = &thread.assistant_id {
            state.assistant_id = bound.clone();
        }

        state = execute(graph, state).await;
        let failed = state.error_message.is_some();
        self.entities.release_busy(&thread_id, failed)?;

        if failed {
            warn!(thread_id = %thread_id, "workflow completed with an agent failure, thread marked FAILED");
        } else {
            info!(thread_id = %thread_id, "workflow completed");
        }
        Ok(state)
    }

    /// Synchronous wait path (`/runs/wait`).
    pub async fn run(&self, graph: WorkflowGraph, state: WorkflowState) -> Result<WorkflowState> {
        self.execute_with_prelude(graph, state).await
    }

    /// Background dispatch path (`/runs/async`); same semantics as `run`,
    /// different caller (§4.4 SUPPLEMENTAL — single entrypoint).
    pub async fn dispatch(&self, graph: WorkflowGraph, state: WorkflowState) -> Result<WorkflowState> {
        self.execute_with_prelude(graph, state).await
    }
}

/// Runs the frontier-scheduling algorithm described in §4.4 steps 1-5.
/// Never returns `Err` — agent failures are folded into `state.error_message`
/// so partial results survive for diagnostics; the caller decides whether to
/// surface a workflow error from `state.error_message`.
async fn execute(graph: WorkflowGraph, mut state: WorkflowState) -> WorkflowState {
    let mut committed: HashSet<String> = HashSet::new();
    let mut remaining: Vec<Node> = graph.nodes;
    let mut aborted = false;

    while !remaining.is_empty() {
        if aborted {
            break;
        }
        let (ready, not_ready): (Vec<Node>, Vec<Node>) = remaining
            .into_iter()
            .partition(|n| n.depends_on.iter().all(|d| committed.contains(d)));
        remaining = not_ready;

        if ready.is_empty() {
            state.error_message = Some("workflow graph has unsatisfiable dependencies".to_string());
            state.exception_count += 1;
            break;
        }

        let snapshot = Arc::new(state.clone());
        let mut futures = FuturesUnordered::new();
        for node in ready {
            let snapshot = snapshot.clone();
            futures.push(async move {
                let result = node.agent.run(&snapshot).await;
                (node.name, result)
            });
        }

        while let Some((name, result)) = futures.next().await {
            match result {
                Ok(delta) => {
                    state.apply_delta(&name, delta);
                    committed.insert(name);
                }
                Err(message) => {
                    error!(agent = %name, error = %message, "agent failed");
                    state.error_message = Some(format!("agent '{name}' failed: {message}"));
                    state.exception_count += 1;
                    aborted = true;
                }
            }
        }
    }

    state.finished_at = Some(chrono::Utc::now());
    state
}

/// Stub identity helper kept for call sites that only have a thread/assistant
/// pair and need a fresh `WorkflowState`.
pub fn new_state(
    thread_id: ThreadId,
    assistant_id: AssistantId,
    tenant_id: impl Into<String>,
    input: Vec<conductor_core::types::Message>,
) -> WorkflowState {
    WorkflowState::new(
        conductor_core::types::WorkflowId::new().to_string(),
        thread_id,
        assistant_id,
        tenant_id,
        input,
    )
}
