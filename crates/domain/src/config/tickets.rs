use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    /// Full REST URL of the ticket table
    /// (e.g. `https://api.airtable.com/v0/<base>/<table>`).
    #[serde(default)]
    pub table_url: String,
    /// Environment variable holding the table API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_15000")]
    pub request_timeout_ms: u64,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            table_url: String::new(),
            api_key_env: d_api_key_env(),
            request_timeout_ms: 15_000,
        }
    }
}

fn d_api_key_env() -> String {
    "AIRTABLE_API_KEY".into()
}
fn d_15000() -> u64 {
    15_000
}
