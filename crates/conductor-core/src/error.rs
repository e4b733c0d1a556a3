use thiserror::Error;

/// Domain-level error taxonomy shared across every crate in the workspace.
///
/// Variants map 1:1 onto the error kinds a caller at the HTTP boundary needs
/// to distinguish; `.code()` is the stable wire string sent back to clients
/// and embedded in failed-callback payloads.
#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("tenant not found: {id}")]
    TenantNotFound { id: String },

    #[error("tenant disabled: {id}")]
    TenantDisabled { id: String },

    #[error("tenant mismatch: expected {expected}, got {actual}")]
    TenantMismatch { expected: String, actual: String },

    #[error("assistant not found: {id}")]
    AssistantNotFound { id: String },

    #[error("assistant inactive: {id}")]
    AssistantInactive { id: String },

    #[error("thread not found: {id}")]
    ThreadNotFound { id: String },

    #[error("thread access denied: {id}")]
    ThreadAccessDenied { id: String },

    #[error("thread busy: {id}")]
    ThreadBusy { id: String },

    #[error("memory not found: {key}")]
    MemoryNotFound { key: String },

    #[error("memory insert failure: {0}")]
    MemoryInsertFailure(String),

    #[error("memory write error: {0}")]
    MemoryWriteError(String),

    #[error("LLM provider error: {0}")]
    LlmError(String),

    #[error("tool error ({tool}): {message}")]
    ToolError { tool: String, message: String },

    #[error("workflow error: {0}")]
    WorkflowError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("upstream timeout after {ms}ms")]
    UpstreamTimeout { ms: u64 },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConductorError {
    /// Stable wire-level error taxonomy code. Never renamed across releases —
    /// callback payloads and HTTP error bodies both depend on this string.
    pub fn code(&self) -> &'static str {
        match self {
            ConductorError::TenantNotFound { .. } => "TENANT_NOT_FOUND",
            ConductorError::TenantDisabled { .. } => "TENANT_DISABLED",
            ConductorError::TenantMismatch { .. } => "TENANT_MISMATCH",
            ConductorError::AssistantNotFound { .. } => "ASSISTANT_NOT_FOUND",
            ConductorError::AssistantInactive { .. } => "ASSISTANT_INACTIVE",
            ConductorError::ThreadNotFound { .. } => "THREAD_NOT_FOUND",
            ConductorError::ThreadAccessDenied { .. } => "THREAD_ACCESS_DENIED",
            ConductorError::ThreadBusy { .. } => "THREAD_BUSY",
            ConductorError::MemoryNotFound { .. } => "MEMORY_NOT_FOUND",
            ConductorError::MemoryInsertFailure(_) => "MEMORY_INSERT_FAILURE",
            ConductorError::MemoryWriteError(_) => "MEMORY_WRITE_ERROR",
            ConductorError::LlmError(_) => "LLM_ERROR",
            ConductorError::ToolError { .. } => "TOOL_ERROR",
            ConductorError::WorkflowError(_) => "WORKFLOW_ERROR",
            ConductorError::ValidationError(_) => "VALIDATION_ERROR",
            ConductorError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            ConductorError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ConductorError::Database(_) => "DATABASE_ERROR",
            ConductorError::Config(_) => "CONFIG_ERROR",
            ConductorError::Serialization(_) => "SERIALIZATION_ERROR",
            ConductorError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error maps to at the gateway boundary (§7 propagation policy).
    pub fn http_status(&self) -> u16 {
        match self {
            ConductorError::ValidationError(_) => 400,
            ConductorError::ThreadAccessDenied { .. } => 403,
            ConductorError::TenantMismatch { .. } => 403,
            ConductorError::TenantNotFound { .. }
            | ConductorError::AssistantNotFound { .. }
            | ConductorError::ThreadNotFound { .. }
            | ConductorError::MemoryNotFound { .. } => 404,
            ConductorError::ThreadBusy { .. } => 409,
            ConductorError::TenantDisabled { .. } | ConductorError::AssistantInactive { .. } => {
                403
            }
            ConductorError::UpstreamTimeout { .. } | ConductorError::UpstreamUnavailable(_) => 502,
            ConductorError::LlmError(_) => 502,
            _ => 500,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ConductorError::ValidationError(msg.into())
    }
}

impl From<rusqlite::Error> for ConductorError {
    fn from(e: rusqlite::Error) -> Self {
        ConductorError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConductorError>;
