use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::types::Message;
use conductor_llm::{ChatRequest, LlmProvider};
use conductor_memory::Summarizer;

/// Bridges the memory crate's provider-agnostic `Summarizer` seam to the LLM
/// router, the only place in the workspace allowed to depend on both (§4.1).
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        tenant_id: &str,
        thread_id: &str,
        messages: &[Message],
    ) -> Result<String, String> {
        let mut transcript = String::new();
        for msg in messages {
            transcript.push_str(&format!("{}: {}\n", msg.role, msg.content.as_text()));
        }
        let prompt = format!(
            "Summarize the following conversation turns into a short factual note \
             for long-term recall. Keep names, dates, and commitments. Conversation:\n\n{transcript}"
        );
        let request = ChatRequest::new(
            self.provider.name().to_string(),
            self.model.clone(),
            vec![Message::user(prompt)],
        );
        let response = self
            .provider
            .send(&request)
            .await
            .map_err(|e| format!("summarization failed for {tenant_id}/{thread_id}: {e}"))?;
        Ok(response.content)
    }
}
