use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_8080")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Route that receives Slack Events API deliveries.
    #[serde(default = "d_events_path")]
    pub events_path: String,
    /// Upper bound on concurrently served HTTP requests.
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: d_host(),
            events_path: d_events_path(),
            max_concurrent_requests: d_max_concurrent(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8080() -> u16 {
    8080
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_events_path() -> String {
    "/slack/events".into()
}
fn d_max_concurrent() -> usize {
    256
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_empty_toml_uses_all_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.events_path, "/slack/events");
        assert_eq!(cfg.max_concurrent_requests, 256);
    }

    #[test]
    fn server_config_parses_overrides() {
        let toml_str = r#"
            port = 3000
            host = "127.0.0.1"
            events_path = "/hooks/slack"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.events_path, "/hooks/slack");
    }
}
