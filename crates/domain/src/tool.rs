use serde::{Deserialize, Serialize};

/// A tool invocation requested by the assistant in the middle of a run.
///
/// `arguments` is the raw JSON string exactly as the runtime sent it; each
/// handler decodes it into its own argument shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: String,
}

/// The single result submitted back for one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub output: String,
}

/// Tool definition registered with the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}
