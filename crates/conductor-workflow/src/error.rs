use conductor_core::ConductorError;
use conductor_entities::EntitiesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Entity(#[from] EntitiesError),

    #[error("agent '{agent}' failed: {message}")]
    AgentFailed { agent: String, message: String },

    #[error("workflow graph error: {0}")]
    GraphError(String),
}

impl From<WorkflowError> for ConductorError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Entity(err) => err.into(),
            WorkflowError::AgentFailed { agent, message } => {
                ConductorError::WorkflowError(format!("agent '{agent}' failed: {message}"))
            }
            WorkflowError::GraphError(msg) => ConductorError::WorkflowError(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
