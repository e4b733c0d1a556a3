use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::types::{Message, MessageRole};
use conductor_llm::{ChatRequest, LlmProvider};
use conductor_memory::MemoryStore;
use conductor_workflow::{
    Agent, JourneyStage, MatchedPrompt, SentimentAnalysis, StateDelta, WorkflowState,
};
use serde::Deserialize;
use tracing::warn;

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a sentiment classifier for customer support \
conversations. Given the latest customer message, respond with a compact JSON object of the \
form {\"sentiment_level\": \"positive\"|\"neutral\"|\"negative\", \"score\": <0.0-1.0>}. Reply \
with JSON only, no prose.";

#[derive(Deserialize)]
struct ClassifierOutput {
    sentiment_level: String,
    score: f64,
}

/// Combines a sentiment classification with the buyer's journey stage to
/// look up a persona-prompt fragment (§4.3 Sentiment/Prompt-Matching Agent).
pub struct SentimentAgent {
    provider: Arc<dyn LlmProvider>,
    memory: Arc<MemoryStore>,
    model: String,
}

impl SentimentAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, memory: Arc<MemoryStore>, model: impl Into<String>) -> Self {
        Self {
            provider,
            memory,
            model: model.into(),
        }
    }

    fn user_turn_count(&self, thread_id: &str) -> usize {
        match self.memory.get_recent(thread_id, None) {
            Ok(messages) => messages
                .iter()
                .filter(|m| m.role == MessageRole::User)
                .count(),
            Err(e) => {
                warn!(thread_id, error = %e, "failed to load recent messages for journey stage");
                0
            }
        }
    }
}

#[async_trait]
impl Agent for SentimentAgent {
    fn name(&self) -> &str {
        "sentiment"
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, String> {
        let latest_text = state
            .input
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_text())
            .unwrap_or_default();

        let request = ChatRequest::new(
            self.provider.name().to_string(),
            self.model.clone(),
            vec![
                Message {
                    role: MessageRole::System,
                    content: conductor_core::types::MessageContent::Text(
                        CLASSIFIER_SYSTEM_PROMPT.to_string(),
                    ),
                    tool_calls: None,
                    tool_call_id: None,
                    created_at: chrono::Utc::now(),
                },
                Message::user(latest_text),
            ],
        );

        let response = self
            .provider
            .send(&request)
            .await
            .map_err(|e| e.to_string())?;

        let parsed: ClassifierOutput = serde_json::from_str(response.content.trim()).unwrap_or_else(|e| {
            warn!(error = %e, raw = %response.content, "sentiment classifier returned unparseable JSON");
            ClassifierOutput {
                sentiment_level: "neutral".to_string(),
                score: 0.5,
            }
        });

        let journey_stage = JourneyStage::from_user_turn_count(self.user_turn_count(state.thread_id.as_str()));
        let matched_prompt = persona_fragment(&parsed.sentiment_level, journey_stage);

        Ok(StateDelta {
            sentiment_analysis: Some(SentimentAnalysis {
                sentiment_level: parsed.sentiment_level,
                journey_stage,
                score: parsed.score,
            }),
            matched_prompt: Some(matched_prompt),
            input_tokens: Some(response.tokens_in as u64),
            output_tokens: Some(response.tokens_out as u64),
            total_tokens: Some((response.tokens_in + response.tokens_out) as u64),
            ..Default::default()
        })
    }
}

/// Pre-authored persona-prompt fragments keyed by (sentiment_level, journey_stage)
/// (§4.3). Sentiment levels outside the known set fall back to the neutral row.
fn persona_fragment(sentiment_level: &str, stage: JourneyStage) -> MatchedPrompt {
    let (tone, strategy) = match (sentiment_level, stage) {
        ("positive", JourneyStage::Awareness) => ("warm", "educate_and_delight"),
        ("positive", JourneyStage::Consideration) => ("enthusiastic", "reinforce_value"),
        ("positive", JourneyStage::Decision) => ("confident", "close_the_sale"),
        ("negative", JourneyStage::Awareness) => ("reassuring", "de_escalate_and_inform"),
        ("negative", JourneyStage::Consideration) => ("empathetic", "address_objections"),
        ("negative", JourneyStage::Decision) => ("careful", "recover_and_retain"),
        (_, JourneyStage::Awareness) => ("friendly", "introduce_and_qualify"),
        (_, JourneyStage::Consideration) => ("helpful", "compare_and_clarify"),
        (_, JourneyStage::Decision) => ("direct", "guide_to_commitment"),
    };
    MatchedPrompt {
        system_prompt: format!(
            "Respond in a {tone} tone using the '{strategy}' strategy, appropriate for a \
customer in the {stage:?} stage of their journey."
        ),
        tone: tone.to_string(),
        strategy: strategy.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_decision_recovers_and_retains() {
        let p = persona_fragment("negative", JourneyStage::Decision);
        assert_eq!(p.strategy, "recover_and_retain");
    }

    #[test]
    fn unknown_sentiment_falls_back_to_neutral_row() {
        let p = persona_fragment("confused", JourneyStage::Awareness);
        assert_eq!(p.strategy, "introduce_and_qualify");
    }
}
