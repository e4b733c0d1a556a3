pub mod agent;
pub mod engine;
pub mod error;
pub mod state;

pub use agent::Agent;
pub use engine::{new_state, Engine, Node, WorkflowGraph};
pub use error::{Result, WorkflowError};
pub use state::{
    AppointmentIntent, AssetMatch, AssetsIntent, AudioOutputIntent, BusinessOutputs,
    IntentAnalysis, JourneyStage, MatchedPrompt, MultimodalOutput, SentimentAnalysis, StateDelta,
    WorkflowState,
};
