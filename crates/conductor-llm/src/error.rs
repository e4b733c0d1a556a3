use conductor_core::ConductorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("tool '{tool}' failed: {message}")]
    ToolError { tool: String, message: String },
}

impl From<LlmError> for ConductorError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ToolError { tool, message } => ConductorError::ToolError { tool, message },
            other => ConductorError::LlmError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
