use async_trait::async_trait;
use serde::Deserialize;

use tb_domain::error::Result;
use tb_domain::tool::{ToolCall, ToolDefinition, ToolOutput};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle status of a run as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }

    /// The run ended without producing a reply.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Incomplete | RunStatus::Expired
        )
    }
}

/// One observation of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub id: String,
    pub status: RunStatus,
    /// Pending tool calls; non-empty only while `status` is
    /// [`RunStatus::RequiresAction`].
    pub required_tool_calls: Vec<ToolCall>,
    pub last_error: Option<String>,
}

/// Everything needed to create the assistant definition.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Abstraction over the hosted assistant runtime.
///
/// Implementations may talk to the real REST API or be a test double.
#[async_trait]
pub trait AssistantRuntime: Send + Sync {
    /// Create an assistant definition and return its id.
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<String>;

    /// Create an empty session and return its id.
    async fn create_session(&self) -> Result<String>;

    /// Append a user turn to a session.
    async fn add_user_message(&self, session_id: &str, text: &str) -> Result<()>;

    /// Start a run of `assistant_id` over the session.
    async fn start_run(&self, session_id: &str, assistant_id: &str) -> Result<RunSnapshot>;

    /// Poll the current state of a run.
    async fn get_run(&self, session_id: &str, run_id: &str) -> Result<RunSnapshot>;

    /// Submit one output per pending tool call, in a single batch.
    async fn submit_tool_outputs(
        &self,
        session_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunSnapshot>;

    /// Ask the runtime to stop a run.
    async fn cancel_run(&self, session_id: &str, run_id: &str) -> Result<()>;

    /// Text of the most recent assistant-authored message in the session.
    async fn latest_assistant_reply(&self, session_id: &str) -> Result<Option<String>>;
}
