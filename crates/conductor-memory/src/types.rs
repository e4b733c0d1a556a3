use conductor_core::types::Message;
use serde::{Deserialize, Serialize};

/// LONG_TERM entries come from the summarization pipeline; EPISODIC entries
/// are inserted directly by tool calls or external APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    LongTerm,
    Episodic,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LongTerm => write!(f, "long_term"),
            Self::Episodic => write!(f, "episodic"),
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long_term" => Ok(Self::LongTerm),
            "episodic" => Ok(Self::Episodic),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// A long-term or episodic memory entry scoped to one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermEntry {
    pub id: i64,
    pub tenant_id: String,
    pub thread_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    /// Comma-separated, matching the base workspace's KnowledgeEntry convention.
    pub tags: String,
    pub importance: f64,
    pub access_count: i64,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Short-term buffer entry: a Message plus its position in the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedMessage {
    pub seq: i64,
    pub message: Message,
}

/// Result of `retrieve_context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub short_term: Vec<Message>,
    pub long_term: Vec<LongTermEntry>,
}
