use tb_domain::config::{resolve_secret, Config, ConfigSeverity};

/// Environment variables `serve` needs, with what each one holds.
pub fn required_secrets(config: &Config) -> Vec<(&str, &'static str)> {
    vec![
        (config.slack.bot_token_env.as_str(), "Slack bot token"),
        (config.slack.signing_secret_env.as_str(), "Slack signing secret"),
        (config.slack.admin_channel_env.as_str(), "HR admin channel id"),
        (config.assistant.api_key_env.as_str(), "assistant API key"),
        (config.tickets.api_key_env.as_str(), "ticket table API key"),
    ]
}

/// Check the config file and the secrets it names, printing any issues.
///
/// Returns false when `serve` would refuse to start.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    let missing: Vec<_> = required_secrets(config)
        .into_iter()
        .filter(|(env, _)| resolve_secret(env).is_err())
        .collect();

    if issues.is_empty() && missing.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }
    for (env, what) in &missing {
        println!("[ERROR] env {env}: {what} is not set");
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count()
        + missing.len();
    let warning_count = issues.len() + missing.len() - error_count;

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
///
/// Secrets never appear in the file, only the names of the variables
/// that hold them.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}
