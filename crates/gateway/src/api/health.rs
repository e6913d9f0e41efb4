//! `GET /healthz`: liveness check (no auth).

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "threads": state.threads.len(),
        "running": state.driver.cancels().len(),
    }))
}
