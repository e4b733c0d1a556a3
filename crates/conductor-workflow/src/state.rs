use conductor_core::types::{AssistantId, Message, ThreadId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stage of the buyer's journey, derived from the count of user turns in
/// short-term memory (§4.3: ≤2 awareness, 3-5 consideration, ≥6 decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStage {
    Awareness,
    Consideration,
    Decision,
}

impl JourneyStage {
    pub fn from_user_turn_count(count: usize) -> Self {
        match count {
            0..=2 => JourneyStage::Awareness,
            3..=5 => JourneyStage::Consideration,
            _ => JourneyStage::Decision,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub sentiment_level: String,
    pub journey_stage: JourneyStage,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPrompt {
    pub system_prompt: String,
    pub tone: String,
    pub strategy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentIntent {
    pub detected: bool,
    pub strength: f64,
    pub service: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub time_expression: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsIntent {
    pub detected: bool,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioOutputIntent {
    pub detected: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub appointment_intent: AppointmentIntent,
    pub assets_intent: AssetsIntent,
    pub audio_output_intent: AudioOutputIntent,
}

/// One ranked hit from the external Assets Service (§4.3: name match +5,
/// content match +4, remark match +3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMatch {
    pub asset_id: String,
    pub name: String,
    pub score: i32,
}

/// Synthesized from `appointment_intent`: `status=1` iff strength >= 0.6 AND
/// time resolves to a parseable future timestamp. `time` is epoch-millis, not
/// RFC3339, to match what downstream CRM integrations expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessOutputs {
    pub status: u8,
    pub time: Option<i64>,
    pub service: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultimodalOutput {
    pub kind: String,
    pub url: String,
}

/// The runtime value flowing through the workflow graph (§3). Agents read
/// this and contribute a `StateDelta`; they never mutate it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub thread_id: ThreadId,
    pub assistant_id: AssistantId,
    pub tenant_id: String,

    pub input: Vec<Message>,

    pub sentiment_analysis: Option<SentimentAnalysis>,
    pub intent_analysis: Option<IntentAnalysis>,
    pub matched_prompt: Option<MatchedPrompt>,
    pub assets_data: Vec<AssetMatch>,
    pub business_outputs: Option<BusinessOutputs>,
    pub actions: Vec<String>,

    pub output: String,
    pub multimodal_outputs: Vec<MultimodalOutput>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,

    pub values: Map<String, Value>,
    pub active_agents: Vec<String>,
    pub error_message: Option<String>,
    pub exception_count: u32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl WorkflowState {
    pub fn new(
        workflow_id: impl Into<String>,
        thread_id: ThreadId,
        assistant_id: AssistantId,
        tenant_id: impl Into<String>,
        input: Vec<Message>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            thread_id,
            assistant_id,
            tenant_id: tenant_id.into(),
            input,
            sentiment_analysis: None,
            intent_analysis: None,
            matched_prompt: None,
            assets_data: Vec::new(),
            business_outputs: None,
            actions: Vec::new(),
            output: String::new(),
            multimodal_outputs: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            values: Map::new(),
            active_agents: Vec::new(),
            error_message: None,
            exception_count: 0,
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    /// Folds a delta into this state, applying each field's declared reducer
    /// (§4.4). Agents MUST NOT call this directly — it is the Engine's job.
    pub fn apply_delta(&mut self, agent_name: &str, delta: StateDelta) {
        self.active_agents.push(agent_name.to_string());

        if let Some(v) = delta.sentiment_analysis {
            self.sentiment_analysis = Some(v);
        }
        if let Some(v) = delta.intent_analysis {
            self.intent_analysis = Some(v);
        }
        if let Some(v) = delta.matched_prompt {
            self.matched_prompt = Some(v);
        }
        if let Some(v) = delta.assets_data {
            self.assets_data = v;
        }
        if let Some(v) = delta.business_outputs {
            self.business_outputs = Some(v);
        }
        if let Some(v) = delta.actions {
            self.actions.extend(v);
        }
        if let Some(v) = delta.output {
            self.output = v;
        }
        if let Some(v) = delta.multimodal_outputs {
            self.multimodal_outputs.extend(v);
        }
        self.input_tokens += delta.input_tokens.unwrap_or(0);
        self.output_tokens += delta.output_tokens.unwrap_or(0);
        self.total_tokens += delta.total_tokens.unwrap_or(0);
        if let Some(v) = delta.values {
            merge_map(&mut self.values, agent_name, v);
        }
        if let Some(v) = delta.error_message {
            self.error_message = Some(v);
        }
        self.exception_count += delta.exception_count.unwrap_or(0);
        if let Some(v) = delta.finished_at {
            self.finished_at = Some(v);
        }
    }
}

/// Recursive map-merge for `values`, keyed by agent name at the top level so
/// concurrent agents never collide (§4.4).
fn merge_map(target: &mut Map<String, Value>, agent_name: &str, incoming: Value) {
    match target.get_mut(agent_name) {
        Some(Value::Object(existing)) => {
            if let Value::Object(incoming_obj) = incoming {
                for (k, v) in incoming_obj {
                    merge_value(existing, k, v);
                }
                return;
            }
            target.insert(agent_name.to_string(), incoming);
        }
        _ => {
            target.insert(agent_name.to_string(), incoming);
        }
    }
}

fn merge_value(target: &mut Map<String, Value>, key: String, value: Value) {
    match (target.get_mut(&key), &value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming.clone() {
                merge_value(existing, k, v);
            }
        }
        _ => {
            target.insert(key, value);
        }
    }
}

/// Partial contribution from one agent. Every field is optional; an agent
/// only sets the fields it computed (§4.3 agent contract).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    pub sentiment_analysis: Option<SentimentAnalysis>,
    pub intent_analysis: Option<IntentAnalysis>,
    pub matched_prompt: Option<MatchedPrompt>,
    pub assets_data: Option<Vec<AssetMatch>>,
    pub business_outputs: Option<BusinessOutputs>,
    pub actions: Option<Vec<String>>,
    pub output: Option<String>,
    pub multimodal_outputs: Option<Vec<MultimodalOutput>>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub values: Option<Value>,
    pub error_message: Option<String>,
    pub exception_count: Option<u32>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_state() -> WorkflowState {
        WorkflowState::new(
            "wf1",
            ThreadId::from("th1"),
            AssistantId::from("a1"),
            "t1",
            vec![],
        )
    }

    #[test]
    fn token_fields_sum_across_deltas() {
        let mut state = base_state();
        state.apply_delta(
            "sentiment",
            StateDelta {
                input_tokens: Some(10),
                output_tokens: Some(5),
                ..Default::default()
            },
        );
        state.apply_delta(
            "sales",
            StateDelta {
                input_tokens: Some(20),
                output_tokens: Some(8),
                ..Default::default()
            },
        );
        assert_eq!(state.input_tokens, 30);
        assert_eq!(state.output_tokens, 13);
    }

    #[test]
    fn active_agents_and_actions_concat_in_arrival_order() {
        let mut state = base_state();
        state.apply_delta(
            "intent",
            StateDelta {
                actions: Some(vec!["emit_audio".to_string()]),
                ..Default::default()
            },
        );
        state.apply_delta("sales", StateDelta::default());
        assert_eq!(state.active_agents, vec!["intent", "sales"]);
        assert_eq!(state.actions, vec!["emit_audio"]);
    }

    #[test]
    fn values_merge_keeps_agents_separate() {
        let mut state = base_state();
        state.apply_delta(
            "intent",
            StateDelta {
                values: Some(serde_json::json!({"assets_queried": 3})),
                ..Default::default()
            },
        );
        state.apply_delta(
            "sentiment",
            StateDelta {
                values: Some(serde_json::json!({"score": 0.4})),
                ..Default::default()
            },
        );
        assert_eq!(state.values["intent"]["assets_queried"], 3);
        assert_eq!(state.values["sentiment"]["score"], 0.4);
    }

    #[test]
    fn output_and_error_message_are_last_write_wins() {
        let mut state = base_state();
        state.apply_delta(
            "sales",
            StateDelta {
                output: Some("hello".into()),
                ..Default::default()
            },
        );
        assert_eq!(state.output, "hello");
    }
}
