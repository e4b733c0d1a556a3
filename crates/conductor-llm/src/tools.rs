use std::sync::Arc;

use async_trait::async_trait;
use conductor_memory::MemoryStore;
use serde::Deserialize;

use crate::types::ToolDefinition;

/// Result of executing a tool handler, fed back to the model as a tool message.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// A named tool callable from the tool loop. Handlers are scoped to a single
/// tenant+thread for every invocation (§4.2).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn call(&self, tenant_id: &str, thread_id: &str, arguments: serde_json::Value) -> ToolOutcome;
}

/// Registry of tool handlers, resolved by name at tool-loop time.
#[derive(Clone)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new(handlers: Vec<Arc<dyn ToolHandler>>) -> Self {
        Self { handlers }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.handlers
            .iter()
            .map(|h| ToolDefinition {
                name: h.name().to_string(),
                description: h.description().to_string(),
                input_schema: h.input_schema(),
            })
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.iter().find(|h| h.name() == name)
    }
}

/// `long_term_memory_lookup` — keyword search over a thread's long-term store.
pub struct LongTermMemoryLookup {
    memory: Arc<MemoryStore>,
}

impl LongTermMemoryLookup {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[derive(Deserialize)]
struct LookupArgs {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

#[async_trait]
impl ToolHandler for LongTermMemoryLookup {
    fn name(&self) -> &str {
        "long_term_memory_lookup"
    }

    fn description(&self) -> &str {
        "Search this thread's long-term memory for entries matching a keyword query."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer", "default": 5 }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, tenant_id: &str, thread_id: &str, arguments: serde_json::Value) -> ToolOutcome {
        let args: LookupArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(format!("invalid arguments: {e}")),
        };
        match self
            .memory
            .retrieve_context(tenant_id, thread_id, Some(&args.query), args.limit)
        {
            Ok(bundle) => {
                let rendered = bundle
                    .long_term
                    .iter()
                    .map(|e| format!("- {}", e.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolOutcome::success(if rendered.is_empty() {
                    "no matching memories found".to_string()
                } else {
                    rendered
                })
            }
            Err(e) => ToolOutcome::error(e.to_string()),
        }
    }
}

/// `store_episodic_memory` — writes a non-conversational fact directly to
/// long-term storage, bypassing the summarization pipeline.
pub struct StoreEpisodicMemory {
    memory: Arc<MemoryStore>,
}

impl StoreEpisodicMemory {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[derive(Deserialize)]
struct StoreArgs {
    content: String,
    tags: Option<String>,
}

#[async_trait]
impl ToolHandler for StoreEpisodicMemory {
    fn name(&self) -> &str {
        "store_episodic_memory"
    }

    fn description(&self) -> &str {
        "Record a standalone fact about this thread for later retrieval."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string" },
                "tags": { "type": "string" }
            },
            "required": ["content"]
        })
    }

    async fn call(&self, tenant_id: &str, thread_id: &str, arguments: serde_json::Value) -> ToolOutcome {
        let args: StoreArgs = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolOutcome::error(format!("invalid arguments: {e}")),
        };
        match self
            .memory
            .add_episodic_memory(tenant_id, thread_id, &args.content, args.tags.as_deref())
        {
            Ok(id) => ToolOutcome::success(format!("stored as entry {id}")),
            Err(e) => ToolOutcome::error(e.to_string()),
        }
    }
}
