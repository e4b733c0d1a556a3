use conductor_core::ConductorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TasksError {
    #[error(transparent)]
    Entity(#[from] conductor_entities::EntitiesError),

    #[error(transparent)]
    Memory(#[from] conductor_memory::MemoryError),

    #[error("callback delivery failed after {attempts} attempts: {message}")]
    CallbackFailed { attempts: u32, message: String },

    #[error("validation error: {0}")]
    ValidationError(String),
}

impl From<TasksError> for ConductorError {
    fn from(e: TasksError) -> Self {
        match e {
            TasksError::Entity(err) => err.into(),
            TasksError::Memory(err) => err.into(),
            TasksError::CallbackFailed { message, .. } => {
                ConductorError::UpstreamUnavailable(message)
            }
            TasksError::ValidationError(msg) => ConductorError::ValidationError(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, TasksError>;
