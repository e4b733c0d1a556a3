use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use conductor_core::config::IntentConfig;
use conductor_core::types::{Message, MessageRole};
use conductor_llm::{ChatRequest, LlmProvider};
use conductor_workflow::{
    Agent, AppointmentIntent, AssetsIntent, AudioOutputIntent, BusinessOutputs, IntentAnalysis,
    StateDelta, WorkflowState,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::assets::{rank_assets, AssetsClient};

const INTENT_SYSTEM_PROMPT: &str = "You are an intent extraction engine for customer support \
conversations. Given the latest customer message, respond with a single JSON object of exactly \
this shape (no extra keys, no prose):\n\
{\n\
  \"appointment_intent\": {\"detected\": bool, \"strength\": 0.0-1.0, \"service\": string|null, \
\"name\": string|null, \"phone\": string|null, \"time_expression\": string|null},\n\
  \"assets_intent\": {\"detected\": bool, \"keywords\": [string, ...]},\n\
  \"audio_output_intent\": {\"detected\": bool, \"confidence\": 0.0-1.0}\n\
}";

/// Raw shape the provider may return before normalization. Providers
/// sometimes emit `detected` as a string or `keywords` as a comma-joined
/// string; this struct accepts the loose form so the normalizer downstream
/// (§4.3 SUPPLEMENTAL) can pin it to the canonical one.
#[derive(Deserialize, Default)]
struct RawAppointmentIntent {
    #[serde(default)]
    detected: Value,
    #[serde(default)]
    strength: f64,
    service: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    time_expression: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawAssetsIntent {
    #[serde(default)]
    detected: Value,
    #[serde(default)]
    keywords: Value,
}

#[derive(Deserialize, Default)]
struct RawAudioOutputIntent {
    #[serde(default)]
    detected: Value,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize, Default)]
struct RawIntentOutput {
    #[serde(default)]
    appointment_intent: RawAppointmentIntent,
    #[serde(default)]
    assets_intent: RawAssetsIntent,
    #[serde(default)]
    audio_output_intent: RawAudioOutputIntent,
}

fn normalize_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn normalize_keywords(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_str().map(|s| s.to_string()))
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Single LLM call producing the four sub-intents, then local post-processing:
/// threshold overrides, assets ranking, appointment synthesis, audio action
/// (§4.3 Intent Agent).
pub struct IntentAgent {
    provider: Arc<dyn LlmProvider>,
    assets: Arc<dyn AssetsClient>,
    config: IntentConfig,
    model: String,
}

impl IntentAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        assets: Arc<dyn AssetsClient>,
        config: IntentConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            assets,
            config,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Agent for IntentAgent {
    fn name(&self) -> &str {
        "intent"
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateDelta, String> {
        let latest_text = state
            .input
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_text())
            .unwrap_or_default();

        let request = ChatRequest::new(
            self.provider.name().to_string(),
            self.model.clone(),
            vec![
                Message {
                    role: MessageRole::System,
                    content: conductor_core::types::MessageContent::Text(
                        INTENT_SYSTEM_PROMPT.to_string(),
                    ),
                    tool_calls: None,
                    tool_call_id: None,
                    created_at: chrono::Utc::now(),
                },
                Message::user(latest_text),
            ],
        );

        let response = self
            .provider
            .send(&request)
            .await
            .map_err(|e| e.to_string())?;

        let raw: RawIntentOutput = serde_json::from_str(response.content.trim()).unwrap_or_else(|e| {
            warn!(error = %e, raw = %response.content, "intent agent returned unparseable JSON");
            RawIntentOutput::default()
        });

        let mut appointment_intent = AppointmentIntent {
            detected: normalize_bool(&raw.appointment_intent.detected),
            strength: raw.appointment_intent.strength,
            service: raw.appointment_intent.service,
            name: raw.appointment_intent.name,
            phone: raw.appointment_intent.phone,
            time_expression: raw.appointment_intent.time_expression,
        };
        let mut assets_intent = AssetsIntent {
            detected: normalize_bool(&raw.assets_intent.detected),
            keywords: normalize_keywords(&raw.assets_intent.keywords),
        };
        let mut audio_output_intent = AudioOutputIntent {
            detected: normalize_bool(&raw.audio_output_intent.detected),
            confidence: raw.audio_output_intent.confidence,
        };

        if self.config.enable_threshold_override {
            if appointment_intent.strength < self.config.appointment_intent_threshold {
                appointment_intent.detected = false;
            }
            if audio_output_intent.confidence < self.config.audio_output_intent_threshold {
                audio_output_intent.detected = false;
            }
            // assets_intent carries no scalar score of its own; the configured
            // threshold gates whether a detection is honored at all.
            if self.config.assets_intent_threshold > 0.999 {
                assets_intent.detected = false;
            }
        }

        let mut assets_data = Vec::new();
        if assets_intent.detected && !assets_intent.keywords.is_empty() {
            match self.assets.list_assets(&state.tenant_id).await {
                Ok(candidates) => {
                    assets_data = rank_assets(&candidates, &assets_intent.keywords, self.config.assets_top_k);
                }
                Err(e) => warn!(tenant_id = %state.tenant_id, error = %e, "assets lookup failed"),
            }
        }

        let business_outputs = synthesize_business_outputs(&appointment_intent);

        let mut actions = Vec::new();
        if audio_output_intent.detected {
            actions.push("emit_audio".to_string());
        }

        Ok(StateDelta {
            intent_analysis: Some(IntentAnalysis {
                appointment_intent,
                assets_intent,
                audio_output_intent,
            }),
            assets_data: Some(assets_data),
            business_outputs: Some(business_outputs),
            actions: if actions.is_empty() { None } else { Some(actions) },
            input_tokens: Some(response.tokens_in as u64),
            output_tokens: Some(response.tokens_out as u64),
            total_tokens: Some((response.tokens_in + response.tokens_out) as u64),
            ..Default::default()
        })
    }
}

/// `status=1` iff strength >= 0.6 AND `time_expression` resolves to a
/// parseable future timestamp (§4.3).
fn synthesize_business_outputs(intent: &AppointmentIntent) -> BusinessOutputs {
    let resolved_time = intent
        .time_expression
        .as_deref()
        .and_then(|expr| parse_future_timestamp(expr, Utc::now()));
    let status = if intent.detected && intent.strength >= 0.6 && resolved_time.is_some() {
        1
    } else {
        0
    };
    BusinessOutputs {
        status,
        time: resolved_time.map(|t| t.timestamp_millis()),
        service: intent.service.clone(),
        name: intent.name.clone(),
        phone: intent.phone.clone(),
    }
}

/// Resolves a `time_expression` to a future instant. Accepts RFC3339 first,
/// then falls back to the relative day/time-of-day phrasing customers
/// actually type ("明天下午", "后天早上9点"); anything that doesn't resolve
/// to a point strictly after `now` is treated as unparseable.
fn parse_future_timestamp(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let resolved = DateTime::parse_from_rfc3339(expr)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| resolve_relative_chinese_time(expr, now))?;
    (resolved > now).then_some(resolved)
}

const DAY_OFFSETS: &[(&str, i64)] = &[
    ("大后天", 3),
    ("后天", 2),
    ("明天", 1),
    ("今天", 0),
    ("今日", 0),
];

const TIME_ANCHORS: &[(&str, u32)] = &[
    ("凌晨", 0),
    ("早上", 9),
    ("早晨", 9),
    ("上午", 9),
    ("中午", 12),
    ("下午", 15),
    ("傍晚", 18),
    ("晚上", 20),
    ("深夜", 23),
];

/// Day offset + time-of-day anchor, defaulting to 09:00 when no anchor is
/// present. An explicit hour ("3点", "15:00") overrides the anchor's hour.
fn resolve_relative_chinese_time(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let day_offset = DAY_OFFSETS
        .iter()
        .find(|(kw, _)| expr.contains(kw))
        .map(|(_, d)| *d)?;
    let hour = explicit_hour(expr)
        .or_else(|| TIME_ANCHORS.iter().find(|(kw, _)| expr.contains(kw)).map(|(_, h)| *h))
        .unwrap_or(9);
    let target_date = (now + chrono::Duration::days(day_offset)).date_naive();
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    Some(Utc.from_utc_datetime(&target_date.and_time(time)))
}

/// Pulls the digits immediately preceding "点"/":"/"：" out of a phrase and
/// promotes a 1-11 hour to PM when an afternoon/evening anchor is also
/// present ("下午3点" -> 15).
fn explicit_hour(expr: &str) -> Option<u32> {
    let chars: Vec<char> = expr.chars().collect();
    let is_pm = expr.contains("下午") || expr.contains("晚上") || expr.contains("傍晚");

    for (i, c) in chars.iter().enumerate() {
        if *c != '点' && *c != ':' && *c != '：' {
            continue;
        }
        let mut start = i;
        while start > 0 && chars[start - 1].is_ascii_digit() {
            start -= 1;
        }
        if start == i {
            continue;
        }
        let digits: String = chars[start..i].iter().collect();
        if let Ok(mut hour) = digits.parse::<u32>() {
            if is_pm && hour <= 11 {
                hour += 12;
            }
            if hour < 24 {
                return Some(hour);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_bool_accepts_string_truthy_forms() {
        assert!(normalize_bool(&Value::String("true".into())));
        assert!(normalize_bool(&Value::String("Yes".into())));
        assert!(!normalize_bool(&Value::String("nope".into())));
    }

    #[test]
    fn normalize_keywords_splits_comma_joined_string() {
        let kws = normalize_keywords(&Value::String("facial, massage ,spa".into()));
        assert_eq!(kws, vec!["facial", "massage", "spa"]);
    }

    #[test]
    fn business_outputs_status_requires_future_parseable_time() {
        let past = (Utc::now() - chrono::Duration::days(1)).to_rfc3339();
        let intent = AppointmentIntent {
            detected: true,
            strength: 0.9,
            service: None,
            name: None,
            phone: None,
            time_expression: Some(past),
        };
        assert_eq!(synthesize_business_outputs(&intent).status, 0);
    }

    #[test]
    fn business_outputs_status_zero_below_strength_threshold() {
        let future = (Utc::now() + chrono::Duration::days(1)).to_rfc3339();
        let intent = AppointmentIntent {
            detected: true,
            strength: 0.4,
            service: None,
            name: None,
            phone: None,
            time_expression: Some(future),
        };
        assert_eq!(synthesize_business_outputs(&intent).status, 0);
    }

    #[test]
    fn business_outputs_resolves_relative_chinese_phrase_to_epoch_millis() {
        let intent = AppointmentIntent {
            detected: true,
            strength: 0.9,
            service: Some("看房".into()),
            name: None,
            phone: None,
            time_expression: Some("明天下午".into()),
        };
        let outputs = synthesize_business_outputs(&intent);
        assert_eq!(outputs.status, 1);
        let millis = outputs.time.expect("relative phrase should resolve");
        assert!(millis > Utc::now().timestamp_millis());
    }

    #[test]
    fn explicit_hour_promotes_to_pm_when_afternoon_anchor_present() {
        assert_eq!(explicit_hour("下午3点"), Some(15));
        assert_eq!(explicit_hour("15:00"), Some(15));
        assert_eq!(explicit_hour("上午9点"), Some(9));
    }

    #[test]
    fn resolve_relative_chinese_time_rejects_unrecognized_phrase() {
        let now = Utc::now();
        assert!(resolve_relative_chinese_time("随便什么时候", now).is_none());
    }
}
