use conductor_core::ConductorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("memory write error: {0}")]
    WriteError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<MemoryError> for ConductorError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::Database(err) => ConductorError::Database(err.to_string()),
            MemoryError::NotFound(key) => ConductorError::MemoryNotFound { key },
            MemoryError::WriteError(msg) => ConductorError::MemoryWriteError(msg),
            MemoryError::Serialization(err) => ConductorError::Serialization(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
