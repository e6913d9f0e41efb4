//! Slack Events API endpoint.
//!
//! Every delivery is signature-checked against the raw body before it is
//! parsed.  Slack expects an answer within three seconds, so messages are
//! handed to the session driver on a background task and the request is
//! acknowledged immediately.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use tb_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use tb_slack::{verify_request, EventEnvelope};

use super::api_error;
use crate::state::AppState;

/// `POST {server.events_path}`
pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_request(
        &state.signing_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &body,
        chrono::Utc::now().timestamp(),
        state.config.slack.signature_tolerance_secs,
    ) {
        tracing::warn!(error = %e, "rejected Slack delivery");
        return api_error(StatusCode::FORBIDDEN, e.to_string());
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable Slack delivery");
            return api_error(StatusCode::BAD_REQUEST, format!("invalid event payload: {e}"));
        }
    };

    match &envelope {
        EventEnvelope::UrlVerification { challenge } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        EventEnvelope::EventCallback { event_id, .. } => {
            let Some(msg) = envelope.message() else {
                return StatusCode::OK.into_response();
            };
            if !msg.is_actionable() {
                tracing::trace!(channel = %msg.channel, ts = %msg.ts, "ignoring non-user message");
                return StatusCode::OK.into_response();
            }
            if !state.dedupe.first_seen(&msg.delivery_key()) {
                tracing::debug!(
                    event_id = event_id.as_deref().unwrap_or("-"),
                    key = %msg.delivery_key(),
                    "duplicate delivery dropped"
                );
                return StatusCode::OK.into_response();
            }

            let msg = msg.clone();
            let driver = state.driver.clone();
            tokio::spawn(async move { driver.process(msg).await });
            StatusCode::OK.into_response()
        }
        EventEnvelope::Other => StatusCode::OK.into_response(),
    }
}
