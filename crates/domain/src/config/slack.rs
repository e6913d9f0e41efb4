use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slack
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Web API base URL.
    #[serde(default = "d_api_base")]
    pub api_base: String,
    /// Environment variable holding the bot token (`xoxb-…`).
    #[serde(default = "d_bot_token_env")]
    pub bot_token_env: String,
    /// Environment variable holding the app signing secret.
    #[serde(default = "d_signing_secret_env")]
    pub signing_secret_env: String,
    /// Environment variable holding the administrative (HR) channel id.
    /// Only requests originating from this channel may list or close tickets.
    #[serde(default = "d_admin_channel_env")]
    pub admin_channel_env: String,
    /// Replay window for `X-Slack-Request-Timestamp`.
    #[serde(default = "d_300")]
    pub signature_tolerance_secs: u64,
    #[serde(default = "d_10000")]
    pub request_timeout_ms: u64,
    /// How long a delivered `{channel}:{ts}` is remembered for dedupe.
    #[serde(default = "d_3600")]
    pub dedupe_ttl_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: d_api_base(),
            bot_token_env: d_bot_token_env(),
            signing_secret_env: d_signing_secret_env(),
            admin_channel_env: d_admin_channel_env(),
            signature_tolerance_secs: 300,
            request_timeout_ms: 10_000,
            dedupe_ttl_secs: 3_600,
        }
    }
}

fn d_api_base() -> String {
    "https://slack.com/api".into()
}
fn d_bot_token_env() -> String {
    "SLACK_BOT_TOKEN".into()
}
fn d_signing_secret_env() -> String {
    "SLACK_SIGNING_SECRET".into()
}
fn d_admin_channel_env() -> String {
    "HR_CHANNEL_ID".into()
}
fn d_300() -> u64 {
    300
}
fn d_10000() -> u64 {
    10_000
}
fn d_3600() -> u64 {
    3_600
}
