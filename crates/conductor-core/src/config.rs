use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Top-level config (conductor.toml + CONDUCTOR_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            memory: MemoryConfig::default(),
            workflow: WorkflowConfig::default(),
            intent: IntentConfig::default(),
            tasks: TasksConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    pub jwt_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::None,
            jwt_secret: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Jwt,
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Drives MS (§4.1) and the preservation anchor (§4.5 SUPPLEMENTAL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// N_SHORT — short-term buffer capacity.
    #[serde(default = "default_n_short")]
    pub n_short: usize,
    /// N_SUMMARY — append length that triggers summarization.
    #[serde(default = "default_n_summary")]
    pub n_summary: usize,
    /// Short-term buffer TTL (seconds of inactivity).
    #[serde(default = "default_short_term_ttl_secs")]
    pub short_term_ttl_secs: u64,
    /// Long-term memory TTL in days (ES_MEMORY_TTL_DAYS).
    #[serde(default = "default_long_term_ttl_days")]
    pub long_term_ttl_days: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            n_short: default_n_short(),
            n_summary: default_n_summary(),
            short_term_ttl_secs: default_short_term_ttl_secs(),
            long_term_ttl_days: default_long_term_ttl_days(),
        }
    }
}

/// Drives WGE topology selection (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "bool_true")]
    pub enable_parallel_execution: bool,
    /// Bounded wait (seconds) a caller tolerates when the thread is BUSY.
    #[serde(default = "default_busy_wait_secs")]
    pub busy_wait_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enable_parallel_execution: bool_true(),
            busy_wait_secs: default_busy_wait_secs(),
        }
    }
}

/// Drives the Intent Agent's post-processing (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default)]
    pub enable_threshold_override: bool,
    #[serde(default = "default_assets_threshold")]
    pub assets_intent_threshold: f64,
    #[serde(default = "default_appointment_threshold")]
    pub appointment_intent_threshold: f64,
    #[serde(default = "default_audio_output_threshold")]
    pub audio_output_intent_threshold: f64,
    /// Keep the top-k assets matches (source hardcodes 1; configurable here).
    #[serde(default = "default_assets_top_k")]
    pub assets_top_k: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            enable_threshold_override: false,
            assets_intent_threshold: default_assets_threshold(),
            appointment_intent_threshold: default_appointment_threshold(),
            audio_output_intent_threshold: default_audio_output_threshold(),
            assets_top_k: default_assets_top_k(),
        }
    }
}

/// Drives TO (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default = "default_awakening_scan_interval_secs")]
    pub awakening_scan_interval_secs: u64,
    #[serde(default = "default_awakening_batch_size")]
    pub awakening_batch_size: usize,
    #[serde(default = "default_awakening_retry_interval_secs")]
    pub awakening_retry_interval_secs: i64,
    #[serde(default = "default_max_awakening_attempts")]
    pub max_awakening_attempts: u32,
    #[serde(default = "default_preservation_wait_secs")]
    pub preservation_wait_secs: u64,
    #[serde(default = "default_min_messages_to_preserve")]
    pub min_messages_to_preserve: usize,
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_max_concurrent_activities")]
    pub max_concurrent_activities: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            awakening_scan_interval_secs: default_awakening_scan_interval_secs(),
            awakening_batch_size: default_awakening_batch_size(),
            awakening_retry_interval_secs: default_awakening_retry_interval_secs(),
            max_awakening_attempts: default_max_awakening_attempts(),
            preservation_wait_secs: default_preservation_wait_secs(),
            min_messages_to_preserve: default_min_messages_to_preserve(),
            callback_url: default_callback_url(),
            worker_count: default_worker_count(),
            max_concurrent_activities: default_max_concurrent_activities(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.conductor/conductor.db", home)
}
fn default_n_short() -> usize {
    20
}
fn default_n_summary() -> usize {
    15
}
fn default_short_term_ttl_secs() -> u64 {
    3600
}
fn default_long_term_ttl_days() -> i64 {
    30
}
fn default_busy_wait_secs() -> u64 {
    5
}
fn default_assets_threshold() -> f64 {
    0.5
}
fn default_appointment_threshold() -> f64 {
    0.6
}
fn default_audio_output_threshold() -> f64 {
    0.5
}
fn default_assets_top_k() -> usize {
    1
}
fn default_awakening_scan_interval_secs() -> u64 {
    3600
}
fn default_awakening_batch_size() -> usize {
    20
}
fn default_awakening_retry_interval_secs() -> i64 {
    24 * 3600
}
fn default_max_awakening_attempts() -> u32 {
    3
}
fn default_preservation_wait_secs() -> u64 {
    // buffer TTL (1h) minus 45m, floored at a minimum of 60s so a too-small
    // short-term TTL doesn't produce a negative sleep.
    (default_short_term_ttl_secs() as i64 - 45 * 60).max(60) as u64
}
fn default_min_messages_to_preserve() -> usize {
    2
}
fn default_callback_url() -> String {
    "http://localhost:9000".to_string()
}
fn default_worker_count() -> usize {
    4
}
fn default_max_concurrent_activities() -> usize {
    16
}
fn default_llm_provider() -> String {
    "openrouter".to_string()
}
fn default_llm_model() -> String {
    "anthropic/claude-haiku-4.5".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}

impl ConductorConfig {
    /// Load config from a TOML file with CONDUCTOR_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. CONDUCTOR_CONFIG env var
    ///   3. ~/.conductor/conductor.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("CONDUCTOR_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: ConductorConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONDUCTOR_").split("_"))
            .extract()
            .map_err(|e| crate::error::ConductorError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.conductor/conductor.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_internally_consistent() {
        let cfg = ConductorConfig::default();
        assert!(cfg.memory.n_summary < cfg.memory.n_short);
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
    }

    #[test]
    fn preservation_wait_is_less_than_short_term_ttl() {
        assert!(default_preservation_wait_secs() < default_short_term_ttl_secs());
    }
}
