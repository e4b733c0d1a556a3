use std::sync::Arc;
use std::time::Duration;

use conductor_core::config::{MemoryConfig, TasksConfig};
use conductor_core::types::{Message, MessageRole};
use conductor_llm::{ChatRequest, LlmProvider};
use conductor_memory::{MemoryStore, MemoryType};
use tracing::{info, warn};

use crate::error::Result;

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following short conversation in 2-3 \
sentences, preserving any names, dates, or commitments mentioned. Reply with the summary only.";
const PRESERVED_TAG: &str = "auto_preserved_short";
const PRESERVED_TTL_DAYS: i64 = 30;
const MIN_USER_MESSAGES: usize = 2;
const MIN_AVG_MESSAGE_LEN: f64 = 5.0;

/// Deferred, per-thread job scheduled once a thread becomes interesting
/// (§4.5b). Anchored to the moment it is scheduled, not the most recent
/// append (§4.5 SUPPLEMENTAL).
pub struct PreservationJob {
    memory: Arc<MemoryStore>,
    provider: Arc<dyn LlmProvider>,
    tasks_config: TasksConfig,
    memory_config: MemoryConfig,
    model: String,
}

impl PreservationJob {
    pub fn new(
        memory: Arc<MemoryStore>,
        provider: Arc<dyn LlmProvider>,
        tasks_config: TasksConfig,
        memory_config: MemoryConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            memory,
            provider,
            tasks_config,
            memory_config,
            model: model.into(),
        }
    }

    /// Spawns the deferred sleep-then-evaluate task; at most one per thread
    /// is meaningful, so duplicate scheduling by the caller is a no-op on the
    /// data (re-running it just re-evaluates the same eligibility checks).
    pub fn schedule(self: Arc<Self>, tenant_id: String, thread_id: String) {
        let wait = Duration::from_secs(self.tasks_config.preservation_wait_secs);
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Err(e) = self.run_once(&tenant_id, &thread_id).await {
                warn!(thread_id, error = %e, "conversation preservation failed");
            }
        });
    }

    async fn run_once(&self, tenant_id: &str, thread_id: &str) -> Result<()> {
        let recent = self.memory.get_recent(thread_id, None)?;

        if recent.len() >= self.memory_config.n_summary {
            info!(thread_id, "preservation skipped: will_auto_summarize");
            return Ok(());
        }
        if recent.len() < self.tasks_config.min_messages_to_preserve {
            info!(thread_id, "preservation skipped: too_few_messages");
            return Ok(());
        }

        let user_messages: Vec<&Message> = recent.iter().filter(|m| m.role == MessageRole::User).collect();
        if user_messages.len() < MIN_USER_MESSAGES {
            info!(thread_id, "preservation skipped: quality_check_failed (too few user messages)");
            return Ok(());
        }
        let avg_len = user_messages
            .iter()
            .map(|m| m.content.as_text().chars().count())
            .sum::<usize>() as f64
            / user_messages.len() as f64;
        if avg_len < MIN_AVG_MESSAGE_LEN {
            info!(thread_id, avg_len, "preservation skipped: quality_check_failed (messages too short)");
            return Ok(());
        }

        let transcript = recent
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content.as_text()))
            .collect::<Vec<_>>()
            .join("\n");
        let request = ChatRequest::new(
            self.provider.name().to_string(),
            self.model.clone(),
            vec![
                Message {
                    role: MessageRole::System,
                    content: conductor_core::types::MessageContent::Text(SUMMARY_SYSTEM_PROMPT.to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                    created_at: chrono::Utc::now(),
                },
                Message::user(transcript),
            ],
        );
        let response = self
            .provider
            .send(&request)
            .await
            .map_err(|e| crate::error::TasksError::CallbackFailed {
                attempts: 0,
                message: e.to_string(),
            })?;

        let expires_at = chrono::Utc::now() + chrono::Duration::days(PRESERVED_TTL_DAYS);
        self.memory.store_summary(
            tenant_id,
            thread_id,
            &response.content,
            MemoryType::LongTerm,
            Some(PRESERVED_TAG),
            Some(0.6),
            Some(expires_at),
        )?;
        self.memory.shrink_context(thread_id)?;
        info!(thread_id, "conversation preserved");
        Ok(())
    }
}
