mod assistant;
mod observability;
mod server;
mod slack;
mod state;
mod tickets;

pub use assistant::*;
pub use observability::*;
pub use server::*;
pub use slack::*;
pub use state::*;
pub use tickets::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Upper bound for `assistant.poll.multiplier`.
pub const MAX_POLL_MULTIPLIER: f64 = 10.0;
/// Upper bound for `assistant.max_retries`.
pub const MAX_READ_RETRIES: u32 = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub tickets: TicketsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Secrets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Read a secret from the environment variable named in the config.
///
/// Empty values are treated as unset.
pub fn resolve_secret(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_owned()),
        _ => Err(Error::Auth(format!(
            "environment variable '{env_var}' not set or empty"
        ))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Only the file contents are checked here; secrets named by the
    /// `*_env` fields are resolved (and reported) at bootstrap.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if !self.server.events_path.starts_with('/') {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.events_path".into(),
                message: "events_path must start with '/'".into(),
            });
        }

        if self.tickets.table_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tickets.table_url".into(),
                message: "table_url must point at the ticket table".into(),
            });
        }

        if self.slack.signature_tolerance_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "slack.signature_tolerance_secs".into(),
                message: "tolerance must be greater than 0".into(),
            });
        }

        let poll = &self.assistant.poll;
        if poll.initial_interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.poll.initial_interval_ms".into(),
                message: "initial interval must be greater than 0".into(),
            });
        }
        if poll.max_interval_ms < poll.initial_interval_ms {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.poll.max_interval_ms".into(),
                message: "max interval must not be below the initial interval".into(),
            });
        }
        if !(1.0..=MAX_POLL_MULTIPLIER).contains(&poll.multiplier) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.poll.multiplier".into(),
                message: format!("multiplier must be between 1.0 and {MAX_POLL_MULTIPLIER}"),
            });
        }
        if self.assistant.max_retries > MAX_READ_RETRIES {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.max_retries".into(),
                message: format!("max_retries must not exceed {MAX_READ_RETRIES}"),
            });
        }
        if poll.max_polls == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.poll.max_polls".into(),
                message: "max_polls must be greater than 0".into(),
            });
        }
        if poll.max_wait_secs > 600 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "assistant.poll.max_wait_secs".into(),
                message: "runs waiting more than 10 minutes keep a thread locked that long".into(),
            });
        }

        if self.assistant.model.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.model".into(),
                message: "model must not be empty".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
