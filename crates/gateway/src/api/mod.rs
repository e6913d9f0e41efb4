pub mod health;
pub mod slack_events;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the API router.
///
/// Slack deliveries are authenticated per request by their signature, so
/// there is no bearer-token layer here.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::health))
        .route(&state.config.server.events_path, post(slack_events::events))
}

/// JSON error body shared by the handlers.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
