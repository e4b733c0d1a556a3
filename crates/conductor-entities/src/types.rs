use conductor_core::types::{AssistantId, EntityStatus, ThreadId, ThreadStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub status: EntityStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub assistant_id: AssistantId,
    pub tenant_id: String,
    pub status: EntityStatus,
    pub name: String,
    pub occupation: Option<String>,
    pub personality: Option<String>,
    pub industry: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: ThreadId,
    pub tenant_id: String,
    pub assistant_id: Option<AssistantId>,
    pub status: ThreadStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub last_awakening_at: Option<chrono::DateTime<chrono::Utc>>,
    pub awakening_attempt_count: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Projection of Thread consumed by the awakening scan (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadAwakeningRecord {
    pub thread_id: ThreadId,
    pub tenant_id: String,
    pub assistant_id: AssistantId,
    pub awakening_attempt_count: u32,
    pub last_awakening_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Tenant-side staff account managing an assistant's configuration.
/// Supplemental to the core spec (see SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperatorRole {
    Admin,
    #[default]
    Operator,
}

impl OperatorRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, OperatorRole::Admin)
    }
}
