use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::types::{Message, MessageContent, MessageRole};
use conductor_entities::EntityStore;
use conductor_llm::{completions_with_tools, ChatRequest, LlmProvider, ToolRegistry};
use conductor_memory::MemoryStore;
use conductor_workflow::{Agent, StateDelta, WorkflowState};
use tracing::warn;

const DEFAULT_MAX_TOOL_ITERATIONS: usize = 8;
const LONG_TERM_CONTEXT_LIMIT: usize = 5;

/// Composes the persona, thread context, and memory into the final customer
/// reply via the tool-calling gateway, then persists the turn (§4.3 Sales
/// Agent).
pub struct SalesAgent {
    provider: Arc<dyn LlmProvider>,
    memory: Arc<MemoryStore>,
    entities: Arc<EntityStore>,
    tools: ToolRegistry,
    model: String,
    max_tool_iterations: usize,
}

impl SalesAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        memory: Arc<MemoryStore>,
        entities: Arc<EntityStore>,
        tools: ToolRegistry,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            memory,
            entities,
            tools,
            model: model.into(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    fn persona_system_prompt(&self, state: &WorkflowState) -> String {
        let assistant = self.entities.get_assistant(state.assistant_id.as_str()).ok();
        let thread = self.entities.get_thread(state.thread_id.as_str()).ok();

        let mut sections = Vec::new();
        if let Some(assistant) = &assistant {
            let mut persona = format!("You are {}", assistant.name);
            if let Some(occupation) = &assistant.occupation {
                persona.push_str(&format!(", a {occupation}"));
            }
            if let Some(industry) = &assistant.industry {
                persona.push_str(&format!(" in the {industry} industry"));
            }
            persona.push('.');
            if let Some(personality) = &assistant.personality {
                persona.push_str(&format!(" Personality: {personality}."));
            }
            sections.push(persona);
        }
        if let Some(matched) = &state.matched_prompt {
            sections.push(matched.system_prompt.clone());
        }
        if let Some(thread) = &thread {
            if let Some(name) = &thread.customer_name {
                sections.push(format!("The customer's name is {name}."));
            }
        }
        if !state.assets_data.is_empty() {
            let names: Vec<_> = state.assets_data.iter().map(|a| a.name.clone()).collect();
            sections.push(format!("Relevant offerings to mention if helpful: {}.", names.join(", ")));
        }
        sections.join(" ")
    }
}

#[async_trait]
impl Agent for SalesAgent {
    fn name(&self) -> &str {
        "sales"
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, String> {
        let thread_id = state.thread_id.as_str();
        let tenant_id = &state.tenant_id;

        let system_prompt = self.persona_system_prompt(state);
        let mut messages = vec![Message {
            role: MessageRole::System,
            content: MessageContent::Text(system_prompt),
            tool_calls: None,
            tool_call_id: None,
            created_at: chrono::Utc::now(),
        }];

        let long_term = self
            .memory
            .retrieve_context(tenant_id, thread_id, None, LONG_TERM_CONTEXT_LIMIT)
            .map_err(|e| e.to_string())?;
        if !long_term.long_term.is_empty() {
            let summary = long_term
                .long_term
                .iter()
                .map(|e| format!("- {}", e.content))
                .collect::<Vec<_>>()
                .join("\n");
            messages.push(Message {
                role: MessageRole::System,
                content: MessageContent::Text(format!("Known context about this customer:\n{summary}")),
                tool_calls: None,
                tool_call_id: None,
                created_at: chrono::Utc::now(),
            });
        }

        messages.extend(long_term.short_term);
        messages.extend(state.input.iter().cloned());

        let request = ChatRequest::new(self.provider.name().to_string(), self.model.clone(), messages);

        let response = completions_with_tools(
            self.provider.as_ref(),
            request,
            tenant_id,
            thread_id,
            &self.tools,
            self.max_tool_iterations,
        )
        .await
        .map_err(|e| e.to_string())?;

        let mut to_persist = state.input.clone();
        to_persist.push(Message::assistant(response.content.clone()));
        if let Err(e) = self.memory.append(tenant_id, thread_id, &to_persist) {
            warn!(thread_id, error = %e, "failed to persist sales turn to short-term memory");
        }

        Ok(StateDelta {
            output: Some(response.content),
            input_tokens: Some(response.tokens_in as u64),
            output_tokens: Some(response.tokens_out as u64),
            total_tokens: Some((response.tokens_in + response.tokens_out) as u64),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_core::types::{AssistantId, EntityStatus, ThreadId};
    use conductor_entities::Assistant;
    use conductor_llm::{ChatResponse, LlmError};
    use conductor_memory::{MemoryStore, Summarizer};
    use conductor_workflow::MatchedPrompt;

    struct UnusedProvider;

    #[async_trait]
    impl LlmProvider for UnusedProvider {
        fn name(&self) -> &str {
            "unused"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, LlmError> {
            unimplemented!("persona prompt tests never call the provider")
        }
    }

    struct NoopSummarizer;

    #[async_trait]
    impl Summarizer for NoopSummarizer {
        async fn summarize(
            &self,
            _tenant_id: &str,
            _thread_id: &str,
            _messages: &[Message],
        ) -> std::result::Result<String, String> {
            Ok(String::new())
        }
    }

    fn agent_with_entities() -> (SalesAgent, Arc<EntityStore>) {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conductor_entities::db::init_db(&conn).unwrap();
        let db = Arc::new(std::sync::Mutex::new(conn));
        let entities = Arc::new(EntityStore::new(db.clone()));

        let mem_conn = rusqlite::Connection::open_in_memory().unwrap();
        conductor_memory::db::init_db(&mem_conn).unwrap();
        let memory = Arc::new(MemoryStore::new(
            Arc::new(std::sync::Mutex::new(mem_conn)),
            conductor_core::config::MemoryConfig::default(),
            Arc::new(NoopSummarizer),
        ));

        let agent = SalesAgent::new(
            Arc::new(UnusedProvider),
            memory,
            entities.clone(),
            ToolRegistry::new(vec![]),
            "test-model",
        );
        (agent, entities)
    }

    #[test]
    fn persona_prompt_includes_occupation_and_matched_tone() {
        let (agent, entities) = agent_with_entities();
        entities.sync_tenant("t1").unwrap();
        let assistant = entities
            .upsert_assistant(Assistant {
                assistant_id: AssistantId::new(),
                tenant_id: "t1".into(),
                status: EntityStatus::Active,
                name: "Aria".into(),
                occupation: Some("real estate agent".into()),
                personality: None,
                industry: None,
                voice_id: None,
            })
            .unwrap();
        let thread = entities.create_thread("t1", None, None, None).unwrap();

        let mut state = WorkflowState::new(
            "wf1",
            thread.thread_id.clone(),
            assistant.assistant_id.clone(),
            "t1",
            vec![],
        );
        state.matched_prompt = Some(MatchedPrompt {
            system_prompt: "Be warm and reassuring.".into(),
            tone: "warm".into(),
            strategy: "reassure".into(),
        });

        let prompt = agent.persona_system_prompt(&state);
        assert!(prompt.contains("Aria"));
        assert!(prompt.contains("real estate agent"));
        assert!(prompt.contains("Be warm and reassuring."));
    }

    #[test]
    fn persona_prompt_mentions_matched_assets() {
        let (agent, entities) = agent_with_entities();
        entities.sync_tenant("t1").unwrap();
        let assistant = entities
            .upsert_assistant(Assistant {
                assistant_id: AssistantId::new(),
                tenant_id: "t1".into(),
                status: EntityStatus::Active,
                name: "Aria".into(),
                occupation: None,
                personality: None,
                industry: None,
                voice_id: None,
            })
            .unwrap();
        let thread = entities.create_thread("t1", None, None, None).unwrap();

        let mut state = WorkflowState::new(
            "wf1",
            thread.thread_id.clone(),
            assistant.assistant_id.clone(),
            "t1",
            vec![],
        );
        state.assets_data = vec![conductor_workflow::AssetMatch {
            asset_id: "a1".into(),
            name: "Premium Facial Package".into(),
            score: 5,
        }];

        let prompt = agent.persona_system_prompt(&state);
        assert!(prompt.contains("Premium Facial Package"));
    }
}
