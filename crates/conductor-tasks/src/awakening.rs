use std::sync::Arc;
use std::time::Duration;

use conductor_core::config::TasksConfig;
use conductor_core::types::{Message, MessageRole};
use conductor_entities::{EntityStore, ThreadAwakeningRecord};
use conductor_llm::{ChatRequest, LlmProvider};
use conductor_memory::MemoryStore;
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::callback::send_callback;
use crate::error::Result;

const OUTREACH_SYSTEM_PROMPT: &str = "You write a single short (1-2 sentence) friendly \
outreach message re-engaging a customer who has gone quiet. Use the supplied persona and any \
known context. Reply with the message text only, no quotes, no preamble.";

/// Default delay before a freshly created thread's greeting fires, distinct
/// from the much longer `awakening_scan_interval_secs` used for the
/// recurring scan (§4.6).
const GREETING_DELAY: Duration = Duration::from_secs(5);

/// Runs the scheduled Thread Awakening scan and, on request, the one-shot
/// Greeting workflow as a degenerate case of the same delivery path (§4.5a,
/// §4.6).
pub struct AwakeningScanner {
    entities: Arc<EntityStore>,
    memory: Arc<MemoryStore>,
    provider: Arc<dyn LlmProvider>,
    http: reqwest::Client,
    config: TasksConfig,
    model: String,
}

impl AwakeningScanner {
    pub fn new(
        entities: Arc<EntityStore>,
        memory: Arc<MemoryStore>,
        provider: Arc<dyn LlmProvider>,
        config: TasksConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            entities,
            memory,
            provider,
            http: reqwest::Client::new(),
            config,
            model: model.into(),
        }
    }

    /// Fixed-interval scan loop (§4.5a); exits when `shutdown` broadcasts `true`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("awakening scanner started");
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.awakening_scan_interval_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan_once().await {
                        error!(error = %e, "awakening scan failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("awakening scanner shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn scan_once(&self) -> Result<()> {
        let eligible = self.entities.list_awakening_eligible(
            self.config.awakening_batch_size,
            self.config.awakening_retry_interval_secs,
            self.config.max_awakening_attempts,
        )?;
        for record in eligible {
            if let Err(e) = self.awaken_one(&record).await {
                warn!(thread_id = %record.thread_id.as_str(), error = %e, "awakening delivery failed, continuing batch");
            }
        }
        Ok(())
    }

    /// Schedules the one-shot Greeting workflow for a just-created thread:
    /// wait a short fixed delay, then deliver only if no user message has
    /// arrived yet (§4.6).
    pub fn schedule_greeting(self: Arc<Self>, tenant_id: String, thread_id: String, assistant_id: String) {
        tokio::spawn(async move {
            tokio::time::sleep(GREETING_DELAY).await;
            let has_messages = self
                .memory
                .get_recent(&thread_id, Some(1))
                .map(|m| !m.is_empty())
                .unwrap_or(true);
            if has_messages {
                info!(thread_id, "greeting skipped, thread already has messages");
                return;
            }
            let record = ThreadAwakeningRecord {
                thread_id: conductor_core::types::ThreadId::from(thread_id.as_str()),
                tenant_id,
                assistant_id: conductor_core::types::AssistantId::from(assistant_id.as_str()),
                awakening_attempt_count: 0,
                last_awakening_at: None,
            };
            if let Err(e) = self.awaken_one(&record).await {
                warn!(thread_id, error = %e, "greeting delivery failed");
            }
        });
    }

    async fn awaken_one(&self, record: &ThreadAwakeningRecord) -> Result<()> {
        let thread_id = record.thread_id.as_str();
        let assistant = self.entities.get_assistant(record.assistant_id.as_str())?;

        let context = self
            .memory
            .retrieve_context(&record.tenant_id, thread_id, None, 5)?;
        let context_text = context
            .long_term
            .iter()
            .map(|e| e.content.clone())
            .collect::<Vec<_>>()
            .join("\n");

        let persona = format!(
            "You are {}{}.",
            assistant.name,
            assistant
                .occupation
                .as_ref()
                .map(|o| format!(", a {o}"))
                .unwrap_or_default()
        );
        let user_prompt = if context_text.is_empty() {
            "The customer hasn't replied in a while. Write a re-engagement message.".to_string()
        } else {
            format!("Known context:\n{context_text}\nWrite a re-engagement message.")
        };

        let request = ChatRequest::new(
            self.provider.name().to_string(),
            self.model.clone(),
            vec![
                Message {
                    role: MessageRole::System,
                    content: conductor_core::types::MessageContent::Text(format!(
                        "{OUTREACH_SYSTEM_PROMPT} {persona}"
                    )),
                    tool_calls: None,
                    tool_call_id: None,
                    created_at: chrono::Utc::now(),
                },
                Message::user(user_prompt),
            ],
        );

        let response = self.provider.send(&request).await.map_err(|e| {
            crate::error::TasksError::CallbackFailed {
                attempts: 0,
                message: e.to_string(),
            }
        })?;

        let payload = json!({
            "thread_id": thread_id,
            "tenant_id": record.tenant_id,
            "message": response.content,
        });

        let outcome = send_callback(
            &self.http,
            &self.config.callback_url,
            "awakenings",
            "thread_awakening",
            &payload,
            &[],
            Duration::from_secs(10),
            3,
        )
        .await;

        if outcome.success {
            self.entities.record_awakening(thread_id)?;
        } else {
            warn!(thread_id, error = ?outcome.error, "awakening callback delivery failed");
        }
        Ok(())
    }
}
