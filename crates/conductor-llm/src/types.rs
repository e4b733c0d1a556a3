use conductor_core::types::Message;
use serde::{Deserialize, Serialize};

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from a provider response; `arguments` is the raw
/// JSON-decoded payload, still to be parsed into each handler's own shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
}

impl Default for ToolChoice {
    fn default() -> Self {
        ToolChoice::Auto
    }
}

/// Request to the tool & LLM gateway. `provider`/`model` are resolved by the
/// caller from the tenant's configured slot before construction.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    /// JSON schema the final content must validate against, if structured
    /// output is requested.
    pub response_schema: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: 1024,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            response_schema: None,
        }
    }
}

/// Response from a provider, possibly still carrying pending tool calls.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub finish_reason: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn has_pending_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty() && self.finish_reason == "tool_use"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    ApiKey,
    OAuth,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub token_type: TokenType,
    pub expires_at: Option<i64>,
    pub refreshable: bool,
}
