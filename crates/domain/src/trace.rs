use serde::Serialize;

/// Structured trace events emitted across all ticketbridge crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SlackApiCall {
        method: String,
        ok: bool,
        duration_ms: u64,
    },
    AssistantApiCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    TableStoreCall {
        method: String,
        status: u16,
        duration_ms: u64,
    },
    ThreadBound {
        thread_key: String,
        session_id: String,
    },
    ToolDispatched {
        session_id: String,
        run_id: String,
        tool_name: String,
        is_error: bool,
    },
    RunFinished {
        session_id: String,
        run_id: String,
        status: String,
        polls: u32,
        duration_ms: u64,
    },
    NotificationDropped {
        channel: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tb_event");
    }
}
