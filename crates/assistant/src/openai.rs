//! OpenAI Assistants v2 adapter for [`AssistantRuntime`].
//!
//! Sessions map to Assistants *threads*.  Every request carries the
//! `OpenAI-Beta: assistants=v2` header.  Idempotent reads are retried with
//! exponential back-off on 5xx responses and transport errors; writes are
//! sent exactly once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use tb_domain::config::AssistantConfig;
use tb_domain::error::{Error, Result};
use tb_domain::tool::{ToolCall, ToolOutput};
use tb_domain::trace::TraceEvent;

use crate::runtime::{AssistantRuntime, AssistantSpec, RunSnapshot, RunStatus};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<LastError>,
}

#[derive(Debug, Deserialize)]
struct RequiredAction {
    #[serde(default)]
    submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Deserialize)]
struct SubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct LastError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Vec<Value>,
}

impl From<RunObject> for RunSnapshot {
    fn from(run: RunObject) -> Self {
        let required_tool_calls = run
            .required_action
            .and_then(|a| a.submit_tool_outputs)
            .map(|s| {
                s.tool_calls
                    .into_iter()
                    .map(|c| ToolCall {
                        call_id: c.id,
                        tool_name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let last_error = run.last_error.map(|e| {
            match (e.code, e.message) {
                (Some(code), Some(msg)) => format!("{code}: {msg}"),
                (Some(code), None) => code,
                (None, Some(msg)) => msg,
                (None, None) => "unspecified error".into(),
            }
        });

        RunSnapshot {
            id: run.id,
            status: run.status,
            required_tool_calls,
            last_error,
        }
    }
}

/// First text part of a message, if it has one.
fn first_text(message: &WireMessage) -> Option<String> {
    message.content.iter().find_map(|part| {
        if part.get("type").and_then(Value::as_str) == Some("text") {
            part.pointer("/text/value")
                .and_then(Value::as_str)
                .map(str::to_owned)
        } else {
            None
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// REST client for the Assistants API.  Created once at bootstrap; the
/// inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiAssistants {
    pub fn new(cfg: &AssistantConfig, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms.max(1)))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.api_base.trim_end_matches('/').to_owned(),
            api_key,
            max_retries: cfg.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Send a write request once.
    async fn send_once(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        self.execute(endpoint, build_request, 0).await
    }

    /// Send an idempotent read, retrying transient failures.
    async fn send_idempotent(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        self.execute(endpoint, build_request, self.max_retries).await
    }

    async fn execute(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
        max_retries: u32,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt)).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::AssistantApiCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    let err = if status.as_u16() == 401 || status.as_u16() == 403 {
                        Error::Auth(format!("{endpoint} returned {status}: {body}"))
                    } else {
                        Error::Assistant(format!("{endpoint} returned {status}: {body}"))
                    };
                    if status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    TraceEvent::AssistantApiCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Assistant(format!("{endpoint}: all retries exhausted"))))
    }

    async fn parse<T: serde::de::DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| {
            Error::Assistant(format!("failed to parse {endpoint} response: {e}: {body}"))
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl AssistantRuntime for OpenAiAssistants {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String> {
        let url = self.url("/assistants");
        let tools: Vec<Value> = spec
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        let body = json!({
            "name": spec.name,
            "model": spec.model,
            "instructions": spec.instructions,
            "tools": tools,
        });

        let resp = self
            .send_once("POST /assistants", || self.http.post(&url).json(&body))
            .await?;
        let created: IdObject = Self::parse("POST /assistants", resp).await?;
        Ok(created.id)
    }

    async fn create_session(&self) -> Result<String> {
        let url = self.url("/threads");
        let resp = self
            .send_once("POST /threads", || self.http.post(&url).json(&json!({})))
            .await?;
        let created: IdObject = Self::parse("POST /threads", resp).await?;
        Ok(created.id)
    }

    async fn add_user_message(&self, session_id: &str, text: &str) -> Result<()> {
        let url = self.url(&format!("/threads/{session_id}/messages"));
        let body = json!({ "role": "user", "content": text });
        self.send_once("POST /threads/{id}/messages", || {
            self.http.post(&url).json(&body)
        })
        .await?;
        Ok(())
    }

    async fn start_run(&self, session_id: &str, assistant_id: &str) -> Result<RunSnapshot> {
        let url = self.url(&format!("/threads/{session_id}/runs"));
        let body = json!({ "assistant_id": assistant_id });
        let resp = self
            .send_once("POST /threads/{id}/runs", || self.http.post(&url).json(&body))
            .await?;
        let run: RunObject = Self::parse("POST /threads/{id}/runs", resp).await?;
        Ok(run.into())
    }

    async fn get_run(&self, session_id: &str, run_id: &str) -> Result<RunSnapshot> {
        let url = self.url(&format!("/threads/{session_id}/runs/{run_id}"));
        let resp = self
            .send_idempotent("GET /threads/{id}/runs/{id}", || self.http.get(&url))
            .await?;
        let run: RunObject = Self::parse("GET /threads/{id}/runs/{id}", resp).await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        session_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunSnapshot> {
        let url = self.url(&format!(
            "/threads/{session_id}/runs/{run_id}/submit_tool_outputs"
        ));
        let tool_outputs: Vec<Value> = outputs
            .iter()
            .map(|o| json!({ "tool_call_id": o.call_id, "output": o.output }))
            .collect();
        let body = json!({ "tool_outputs": tool_outputs });

        let resp = self
            .send_once("POST /threads/{id}/runs/{id}/submit_tool_outputs", || {
                self.http.post(&url).json(&body)
            })
            .await?;
        let run: RunObject =
            Self::parse("POST /threads/{id}/runs/{id}/submit_tool_outputs", resp).await?;
        Ok(run.into())
    }

    async fn cancel_run(&self, session_id: &str, run_id: &str) -> Result<()> {
        let url = self.url(&format!("/threads/{session_id}/runs/{run_id}/cancel"));
        self.send_once("POST /threads/{id}/runs/{id}/cancel", || self.http.post(&url))
            .await?;
        Ok(())
    }

    async fn latest_assistant_reply(&self, session_id: &str) -> Result<Option<String>> {
        let url = self.url(&format!("/threads/{session_id}/messages"));
        let resp = self
            .send_idempotent("GET /threads/{id}/messages", || {
                self.http
                    .get(&url)
                    .query(&[("order", "desc"), ("limit", "20")])
            })
            .await?;
        let list: MessageList = Self::parse("GET /threads/{id}/messages", resp).await?;

        Ok(list
            .data
            .iter()
            .find(|m| m.role == "assistant")
            .and_then(first_text))
    }
}

/// Wait before retry `attempt` (1-based): 200 ms doubling, capped at 10 s.
fn retry_delay(attempt: u32) -> Duration {
    let ms = 2u64
        .saturating_pow(attempt.saturating_sub(1))
        .saturating_mul(200)
        .min(10_000);
    Duration::from_millis(ms)
}

/// Convert a `reqwest::Error` into the domain `Error`.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
