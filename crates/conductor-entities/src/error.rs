use conductor_core::ConductorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntitiesError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("tenant disabled: {0}")]
    TenantDisabled(String),

    #[error("assistant not found: {0}")]
    AssistantNotFound(String),

    #[error("assistant inactive: {0}")]
    AssistantInactive(String),

    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("thread busy: {0}")]
    ThreadBusy(String),

    #[error("tenant mismatch: expected {expected}, got {actual}")]
    TenantMismatch { expected: String, actual: String },
}

impl From<EntitiesError> for ConductorError {
    fn from(e: EntitiesError) -> Self {
        match e {
            EntitiesError::Database(err) => ConductorError::Database(err.to_string()),
            EntitiesError::TenantNotFound(id) => ConductorError::TenantNotFound { id },
            EntitiesError::TenantDisabled(id) => ConductorError::TenantDisabled { id },
            EntitiesError::AssistantNotFound(id) => ConductorError::AssistantNotFound { id },
            EntitiesError::AssistantInactive(id) => ConductorError::AssistantInactive { id },
            EntitiesError::ThreadNotFound(id) => ConductorError::ThreadNotFound { id },
            EntitiesError::ThreadBusy(id) => ConductorError::ThreadBusy { id },
            EntitiesError::TenantMismatch { expected, actual } => {
                ConductorError::TenantMismatch { expected, actual }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EntitiesError>;
