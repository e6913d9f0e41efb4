//! AppState construction and background-task spawning.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use tb_assistant::{AssistantIdCache, AssistantRuntime, OpenAiAssistants};
use tb_domain::config::{resolve_secret, Config, ConfigSeverity};
use tb_domain::notify::Notifier;
use tb_sessions::ThreadMap;
use tb_slack::{SlackClient, SlackNotifier};
use tb_tickets::{AirtableStore, TableStore, TicketDesk};

use crate::runtime::dedupe::DeliveryDedupe;
use crate::runtime::{SessionDriver, UserDirectory};
use crate::state::AppState;

/// Validate config, resolve secrets, initialize every subsystem and return
/// a fully-wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Secrets ──────────────────────────────────────────────────────
    let bot_token = resolve_secret(&config.slack.bot_token_env).context("Slack bot token")?;
    let signing_secret =
        resolve_secret(&config.slack.signing_secret_env).context("Slack signing secret")?;
    let admin_channel =
        resolve_secret(&config.slack.admin_channel_env).context("HR admin channel id")?;
    let openai_key = resolve_secret(&config.assistant.api_key_env).context("assistant API key")?;
    let table_key = resolve_secret(&config.tickets.api_key_env).context("ticket table API key")?;

    // ── Thread map ───────────────────────────────────────────────────
    let threads = Arc::new(
        ThreadMap::open(&config.state.path).context("opening thread map")?,
    );
    tracing::info!(
        path = %config.state.path.display(),
        bindings = threads.len(),
        "thread map ready"
    );

    // ── Slack ────────────────────────────────────────────────────────
    let slack = SlackClient::new(&config.slack, bot_token).context("creating Slack client")?;
    let notifier: Arc<dyn Notifier> = Arc::new(SlackNotifier::new(slack.clone()));
    let directory: Arc<dyn UserDirectory> = Arc::new(slack);

    // ── Ticket desk ──────────────────────────────────────────────────
    let store: Arc<dyn TableStore> = Arc::new(
        AirtableStore::new(&config.tickets, table_key).context("creating ticket store")?,
    );
    let desk = Arc::new(TicketDesk::new(store, notifier.clone(), admin_channel));
    tracing::info!(table = %config.tickets.table_url, "ticket desk ready");

    // ── Assistant runtime ────────────────────────────────────────────
    let runtime: Arc<dyn AssistantRuntime> = Arc::new(
        OpenAiAssistants::new(&config.assistant, openai_key)
            .context("creating assistant client")?,
    );
    let cache = AssistantIdCache::new(config.state.assistant_cache_path());
    tracing::info!(
        api_base = %config.assistant.api_base,
        model = %config.assistant.model,
        cache = %cache.path().display(),
        "assistant runtime ready"
    );

    let driver = Arc::new(SessionDriver::new(
        threads.clone(),
        runtime,
        desk,
        notifier,
        directory,
        config.assistant.clone(),
        cache,
    ));

    let dedupe = Arc::new(DeliveryDedupe::new(Duration::from_secs(
        config.slack.dedupe_ttl_secs,
    )));

    Ok(AppState {
        config,
        threads,
        driver,
        dedupe,
        signing_secret: Arc::from(signing_secret),
    })
}

/// Spawn the periodic housekeeping loops.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Dedupe expiry + idle thread-lock pruning ─────────────────────
    let dedupe = state.dedupe.clone();
    let driver = state.driver.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let dropped = dedupe.prune_expired();
            driver.locks().prune_idle();
            if dropped > 0 {
                tracing::debug!(dropped, remaining = dedupe.len(), "dedupe keys expired");
            }
        }
    });
}
