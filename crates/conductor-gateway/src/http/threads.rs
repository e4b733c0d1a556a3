use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use conductor_core::types::{AssistantId, Message, MessageContent, MessageRole, ThreadId};
use conductor_entities::EntitiesError;
use conductor_workflow::{new_state, WorkflowError, WorkflowState};

use crate::error_response::{ApiError, ApiResult};
use crate::http::resolve_tenant_id;
use crate::state::{AppState, RunRecord, RunStatus};

const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Deserialize)]
pub struct MessageIn {
    pub role: String,
    pub content: String,
}

impl MessageIn {
    fn into_message(self) -> Result<Message, ApiError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|_| ApiError(conductor_core::ConductorError::validation(format!("unknown role '{}'", self.role))))?;
        Ok(Message {
            role,
            content: MessageContent::Text(self.content),
            tool_calls: None,
            tool_call_id: None,
            created_at: chrono::Utc::now(),
        })
    }
}

#[derive(Deserialize)]
pub struct CreateThreadRequest {
    pub assistant_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
}

/// POST /threads — creates a Thread (IDLE), schedules a greeting TO workflow
/// when an assistant is already bound (§6, §4.6).
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<Json<conductor_entities::Thread>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;
    state.entities.require_active_tenant(&tenant_id)?;

    let assistant_id = req.assistant_id.as_deref().map(AssistantId::from);
    if let Some(id) = &assistant_id {
        state.entities.require_active_assistant_in_tenant(id.as_str(), &tenant_id)?;
    }

    let thread = state.entities.create_thread(
        &tenant_id,
        assistant_id.as_ref(),
        req.customer_name.as_deref(),
        req.customer_phone.as_deref(),
    )?;

    if let Some(id) = assistant_id {
        state.awakening.clone().schedule_greeting(
            tenant_id,
            thread.thread_id.as_str().to_string(),
            id.as_str().to_string(),
        );
    }

    Ok(Json(thread))
}

#[derive(Deserialize)]
pub struct RunRequest {
    pub assistant_id: String,
    pub messages: Vec<MessageIn>,
}

#[derive(Serialize)]
pub struct ThreadRunResponse {
    pub run_id: String,
    pub status: &'static str,
    pub output: String,
    pub actions: Vec<String>,
    pub active_agents: Vec<String>,
    pub business_outputs: Option<conductor_workflow::BusinessOutputs>,
    pub multimodal_outputs: Vec<conductor_workflow::MultimodalOutput>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub error: Option<String>,
}

impl ThreadRunResponse {
    fn from_state(state: WorkflowState) -> Self {
        let failed = state.error_message.is_some();
        Self {
            run_id: state.workflow_id,
            status: if failed { "failed" } else { "completed" },
            output: state.output,
            actions: state.actions,
            active_agents: state.active_agents,
            business_outputs: state.business_outputs,
            multimodal_outputs: state.multimodal_outputs,
            input_tokens: state.input_tokens,
            output_tokens: state.output_tokens,
            total_tokens: state.total_tokens,
            error: state.error_message,
        }
    }
}

fn build_workflow_state(
    tenant_id: String,
    thread_id: &str,
    req: RunRequest,
) -> Result<WorkflowState, ApiError> {
    let input = req
        .messages
        .into_iter()
        .map(MessageIn::into_message)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(new_state(
        ThreadId::from(thread_id),
        AssistantId::from(req.assistant_id.as_str()),
        tenant_id,
        input,
    ))
}

fn workflow_has_user_turn(req: &RunRequest) -> bool {
    req.messages.iter().any(|m| m.role.eq_ignore_ascii_case("user"))
}

/// POST /threads/{thread_id}/runs/wait — run WGE synchronously; on
/// `ThreadBusy`, poll up to `busy_wait_secs` before returning 409 (§5, §6).
pub async fn run_wait(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RunRequest>,
) -> ApiResult<Json<ThreadRunResponse>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;
    let has_user_turn = workflow_has_user_turn(&req);
    let workflow_state = build_workflow_state(tenant_id.clone(), &thread_id, req)?;

    let max_wait = Duration::from_secs(state.config.workflow.busy_wait_secs);
    let mut waited = Duration::ZERO;
    loop {
        let graph = state.build_graph();
        match state.engine.run(graph, workflow_state.clone()).await {
            Ok(result) => {
                if has_user_turn {
                    state.schedule_preservation_once(tenant_id, thread_id);
                }
                return Ok(Json(ThreadRunResponse::from_state(result)));
            }
            Err(WorkflowError::Entity(EntitiesError::ThreadBusy(id))) => {
                if waited >= max_wait {
                    return Err(ApiError(conductor_core::ConductorError::ThreadBusy { id }));
                }
                tokio::time::sleep(BUSY_POLL_INTERVAL).await;
                waited += BUSY_POLL_INTERVAL;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// POST /threads/{thread_id}/runs/async — launches WGE in a background task;
/// returns immediately, final state delivered via callback (§6).
pub async fn run_async(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RunRequest>,
) -> ApiResult<Json<ThreadRunResponse>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;
    let has_user_turn = workflow_has_user_turn(&req);
    let workflow_state = build_workflow_state(tenant_id.clone(), &thread_id, req)?;
    let run_id = workflow_state.workflow_id.clone();

    state.runs.insert(
        run_id.clone(),
        RunRecord {
            status: RunStatus::Running,
            thread_id: thread_id.clone(),
            output: None,
            error: None,
            input_tokens: 0,
            output_tokens: 0,
            started_at: chrono::Utc::now(),
            finished_at: None,
        },
    );

    let bg_state = state.clone();
    let bg_run_id = run_id.clone();
    let bg_tenant_id = tenant_id.clone();
    let bg_thread_id = thread_id.clone();
    tokio::spawn(async move {
        let graph = bg_state.build_graph();
        let outcome = bg_state.engine.dispatch(graph, workflow_state).await;
        if has_user_turn && outcome.is_ok() {
            bg_state.schedule_preservation_once(bg_tenant_id, bg_thread_id);
        }
        deliver_async_result(&bg_state, &bg_run_id, outcome).await;
    });

    Ok(Json(ThreadRunResponse {
        run_id,
        status: "running",
        output: String::new(),
        actions: Vec::new(),
        active_agents: Vec::new(),
        business_outputs: None,
        multimodal_outputs: Vec::new(),
        input_tokens: 0,
        output_tokens: 0,
        total_tokens: 0,
        error: None,
    }))
}

async fn deliver_async_result(
    state: &Arc<AppState>,
    run_id: &str,
    outcome: Result<WorkflowState, WorkflowError>,
) {
    let (record, callback_event) = match outcome {
        Ok(result) => {
            let failed = result.error_message.is_some();
            let status = if failed { RunStatus::Failed } else { RunStatus::Completed };
            let record = RunRecord {
                status,
                thread_id: result.thread_id.as_str().to_string(),
                output: Some(result.output.clone()),
                error: result.error_message.clone(),
                input_tokens: result.input_tokens,
                output_tokens: result.output_tokens,
                started_at: result.started_at,
                finished_at: result.finished_at,
            };
            let event = serde_json::json!({
                "assistantId": result.assistant_id.as_str(),
                "threadId": result.thread_id.as_str(),
                "eventId": run_id,
                "eventTime": chrono::Utc::now().timestamp_millis(),
                "eventContent": {
                    "run_id": run_id,
                    "status": if failed { "failed" } else { "completed" },
                    "data": {
                        "output": result.output,
                        "input_tokens": result.input_tokens,
                        "output_tokens": result.output_tokens,
                    },
                    "error": result.error_message,
                    "processing_time": result.finished_at.map(|f| (f - result.started_at).num_milliseconds()),
                    "finished_at": result.finished_at.map(|f| f.timestamp_millis()),
                }
            });
            (record, event)
        }
        Err(e) => {
            warn!(run_id, error = %e, "async workflow dispatch failed before completion");
            let record = RunRecord {
                status: RunStatus::Failed,
                thread_id: String::new(),
                output: None,
                error: Some(e.to_string()),
                input_tokens: 0,
                output_tokens: 0,
                started_at: chrono::Utc::now(),
                finished_at: Some(chrono::Utc::now()),
            };
            let event = serde_json::json!({
                "eventId": run_id,
                "eventTime": chrono::Utc::now().timestamp_millis(),
                "eventContent": {
                    "run_id": run_id,
                    "status": "failed",
                    "data": serde_json::Value::Null,
                    "error": e.to_string(),
                }
            });
            (record, event)
        }
    };

    state.runs.insert(run_id.to_string(), record);

    let outcome = conductor_tasks::send_callback(
        &state.http_client,
        &state.config.tasks.callback_url,
        "runs",
        "workflow_run",
        &callback_event,
        &[],
        Duration::from_secs(30),
        state.config.tasks.max_awakening_attempts.max(1),
    )
    .await;
    if !outcome.success {
        warn!(run_id, error = ?outcome.error, "failed to deliver async run callback");
    } else {
        info!(run_id, "async run callback delivered");
    }
}

#[derive(Serialize)]
pub struct RunStatusResponse {
    pub run_id: String,
    pub status: RunStatus,
    pub thread_id: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// POST /threads/{thread_id}/runs/{run_id}/status — polls a background run
/// started via `/runs/async` (§6).
pub async fn run_status(
    State(state): State<Arc<AppState>>,
    Path((_thread_id, run_id)): Path<(String, String)>,
) -> ApiResult<Json<RunStatusResponse>> {
    let record = state
        .runs
        .get(&run_id)
        .ok_or_else(|| ApiError(conductor_core::ConductorError::ValidationError(format!("unknown run_id '{run_id}'"))))?;
    Ok(Json(RunStatusResponse {
        run_id,
        status: record.status,
        thread_id: record.thread_id.clone(),
        output: record.output.clone(),
        error: record.error.clone(),
        input_tokens: record.input_tokens,
        output_tokens: record.output_tokens,
    }))
}

#[derive(Deserialize)]
pub struct AppendMemoryRequest {
    pub messages: Vec<MessageIn>,
}

/// POST /threads/{thread_id}/memory/append — appends to the short-term
/// buffer; if the thread is BUSY, waits up to 5 s before proceeding anyway
/// (MS appends do not require the WGE busy lock, §6).
pub async fn append_memory(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AppendMemoryRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let tenant_id = resolve_tenant_id(&headers, None)?;

    let mut waited = Duration::ZERO;
    let max_wait = Duration::from_secs(5);
    while state.entities.get_thread(&thread_id)?.status == conductor_core::types::ThreadStatus::Busy
        && waited < max_wait
    {
        tokio::time::sleep(BUSY_POLL_INTERVAL).await;
        waited += BUSY_POLL_INTERVAL;
    }

    let has_user_turn = req.messages.iter().any(|m| m.role.eq_ignore_ascii_case("user"));
    let messages = req
        .messages
        .into_iter()
        .map(MessageIn::into_message)
        .collect::<Result<Vec<_>, _>>()?;
    let new_length = state.memory.append(&tenant_id, &thread_id, &messages)?;
    if has_user_turn {
        state.schedule_preservation_once(tenant_id, thread_id);
    }
    Ok(Json(serde_json::json!({"new_length": new_length})))
}
