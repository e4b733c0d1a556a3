pub mod error;
pub mod gateway;
pub mod http_provider;
pub mod provider;
pub mod router;
pub mod tools;
pub mod types;

pub use error::{LlmError, Result};
pub use gateway::completions_with_tools;
pub use http_provider::HttpProvider;
pub use provider::{LlmProvider, StreamEvent};
pub use router::{ProviderRouter, ProviderSlot};
pub use tools::{LongTermMemoryLookup, StoreEpisodicMemory, ToolHandler, ToolOutcome, ToolRegistry};
pub use types::{ChatRequest, ChatResponse, ToolCall, ToolChoice, ToolDefinition};
