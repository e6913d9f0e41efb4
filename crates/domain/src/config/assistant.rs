use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistant runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "d_api_base")]
    pub api_base: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Model used when the assistant definition is first created.
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_name")]
    pub name: String,
    /// Replaces the built-in HR instruction prompt when set.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "d_30000")]
    pub request_timeout_ms: u64,
    /// Retries for idempotent reads (run polls, message listing) on 5xx
    /// responses and transport errors.  Off unless configured; writes are
    /// never retried.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub poll: PollConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: d_api_base(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            name: d_name(),
            instructions: None,
            request_timeout_ms: 30_000,
            max_retries: 0,
            poll: PollConfig::default(),
        }
    }
}

/// Run-status polling policy.
///
/// The wait starts at `initial_interval_ms`, grows by `multiplier` after
/// every non-terminal poll up to `max_interval_ms`, and drops back to the
/// initial interval after tool outputs are submitted.  A run is abandoned
/// after `max_polls` round trips (status polls and tool submissions) or
/// `max_wait_secs` of wall time, whichever comes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "d_1000")]
    pub initial_interval_ms: u64,
    #[serde(default = "d_8000")]
    pub max_interval_ms: u64,
    #[serde(default = "d_multiplier")]
    pub multiplier: f64,
    #[serde(default = "d_120")]
    pub max_polls: u32,
    #[serde(default = "d_300")]
    pub max_wait_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            max_interval_ms: 8_000,
            multiplier: 2.0,
            max_polls: 120,
            max_wait_secs: 300,
        }
    }
}

fn d_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4-1106-preview".into()
}
fn d_name() -> String {
    "Slackbot HR-Assistant".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_1000() -> u64 {
    1_000
}
fn d_8000() -> u64 {
    8_000
}
fn d_multiplier() -> f64 {
    2.0
}
fn d_120() -> u32 {
    120
}
fn d_300() -> u64 {
    300
}
