//! Slack Web API client.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use tb_domain::config::SlackConfig;
use tb_domain::error::{Error, Result};
use tb_domain::trace::TraceEvent;

/// Display name used when a user lookup fails.
pub const UNKNOWN_USER: &str = "Unknown User";

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    ok: bool,
    #[serde(default)]
    user: Option<SlackUser>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SlackClient {
    http: Client,
    api_base: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(cfg: &SlackConfig, bot_token: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms.max(1)))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_owned(),
            bot_token: bot_token.trim().to_owned(),
        })
    }

    /// Post a plain-text message, optionally as a thread reply.  Returns
    /// the new message's `ts`.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
            "mrkdwn": false,
        });
        if let Some(ts) = thread_ts {
            payload["thread_ts"] = Value::String(ts.to_owned());
        }

        let url = format!("{}/chat.postMessage", self.api_base);
        let resp: PostMessageResponse = self
            .call::<PostMessageResponse>(
                "chat.postMessage",
                |r| r.ok,
                self.http.post(url).json(&payload),
            )
            .await?;

        if !resp.ok {
            return Err(slack_error("chat.postMessage", resp.error));
        }
        Ok(resp.ts.unwrap_or_default())
    }

    /// The user's `real_name`, falling back to their handle.
    pub async fn user_real_name(&self, user_id: &str) -> Result<String> {
        let url = format!("{}/users.info", self.api_base);
        let resp: UsersInfoResponse = self
            .call::<UsersInfoResponse>(
                "users.info",
                |r| r.ok,
                self.http.get(url).query(&[("user", user_id)]),
            )
            .await?;

        if !resp.ok {
            return Err(slack_error("users.info", resp.error));
        }
        resp.user
            .and_then(|u| {
                u.real_name
                    .filter(|n| !n.trim().is_empty())
                    .or(u.name.filter(|n| !n.trim().is_empty()))
            })
            .ok_or_else(|| Error::Slack {
                method: "users.info".into(),
                message: "user has no name".into(),
            })
    }

    /// [`Self::user_real_name`], or [`UNKNOWN_USER`] on any failure.
    pub async fn display_name(&self, user_id: &str) -> String {
        match self.user_real_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "user lookup failed");
                UNKNOWN_USER.to_owned()
            }
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        is_ok: impl Fn(&T) -> bool,
        rb: reqwest::RequestBuilder,
    ) -> Result<T> {
        let start = Instant::now();
        let result = rb.bearer_auth(&self.bot_token).send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let parsed = match result {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.map_err(from_reqwest)?;
                serde_json::from_str::<T>(&body).map_err(|e| Error::Slack {
                    method: method.to_owned(),
                    message: format!("unreadable response: {e}"),
                })
            }
            Ok(resp) => Err(Error::Slack {
                method: method.to_owned(),
                message: format!("HTTP {}", resp.status().as_u16()),
            }),
            Err(e) => Err(from_reqwest(e)),
        };

        TraceEvent::SlackApiCall {
            method: method.to_owned(),
            ok: parsed.as_ref().map(|r| is_ok(r)).unwrap_or(false),
            duration_ms,
        }
        .emit();

        parsed
    }
}

fn slack_error(method: &str, error: Option<String>) -> Error {
    Error::Slack {
        method: method.to_owned(),
        message: error.unwrap_or_else(|| "unknown error".to_owned()),
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
