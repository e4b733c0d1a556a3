use async_trait::async_trait;

use crate::state::{StateDelta, WorkflowState};

/// Uniform agent contract (§4.3): reads the state, returns a partial delta.
/// Implementations MUST NOT mutate `state` and MUST be side-effect-free with
/// respect to anything the reducer doesn't see (the one exception being
/// calls out to MS/TG, which are themselves idempotent or append-only).
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name recorded in `active_agents` and used as the `values` map key.
    fn name(&self) -> &str;

    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, String>;
}
