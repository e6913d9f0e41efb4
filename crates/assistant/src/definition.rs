//! The HR assistant definition and its on-disk id cache.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

use tb_domain::config::AssistantConfig;
use tb_domain::error::{Error, Result};
use tb_domain::tool::ToolDefinition;

use crate::runtime::{AssistantRuntime, AssistantSpec};

pub const TOOL_CREATE_TICKET: &str = "create_new_ticket";
pub const TOOL_LIST_TICKETS: &str = "get_all_tickets";
pub const TOOL_UPDATE_STATUS: &str = "update_ticket_status";

/// Default instruction prompt.
pub const HR_INSTRUCTIONS: &str = "\
You are a Slack assistant that helps employees with HR requests. Keep a formal, professional tone.

When someone opens a new ticket, ask for the title, the details and the priority one at a time, \
and only create the ticket once you have all three.

When listing tickets, show the Title, Details, Status, Priority, Created By and the creation date \
written like 13 Jan 2024.

Reply in plain text only. Slack does not render markdown, so never use asterisks or any other \
formatting characters.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool schemas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: TOOL_CREATE_TICKET.into(),
            description: "Open a new HR ticket with a title, details and priority.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ticket_title": {
                        "type": "string",
                        "description": "Short title summarising the request."
                    },
                    "ticket_details": {
                        "type": "string",
                        "description": "Full description of the request."
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["Low", "Medium", "High"],
                        "description": "How urgent the request is."
                    }
                },
                "required": ["ticket_title", "ticket_details", "priority"]
            }),
        },
        ToolDefinition {
            name: TOOL_LIST_TICKETS.into(),
            description: "List every Pending ticket. Only HR staff may use this; show Title, \
                          Details, Status, Priority and Created By."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: TOOL_UPDATE_STATUS.into(),
            description: "Mark the Pending ticket with the given title as Done. HR staff only."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Exact title of the ticket to close."
                    }
                },
                "required": ["title"]
            }),
        },
    ]
}

pub fn assistant_spec(cfg: &AssistantConfig) -> AssistantSpec {
    AssistantSpec {
        name: cfg.name.clone(),
        model: cfg.model.clone(),
        instructions: cfg
            .instructions
            .clone()
            .unwrap_or_else(|| HR_INSTRUCTIONS.to_owned()),
        tools: tool_definitions(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Id cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize, Deserialize)]
struct CachedAssistant {
    assistant_id: String,
}

/// `{"assistant_id": "..."}` file that lets restarts reuse one assistant.
#[derive(Debug, Clone)]
pub struct AssistantIdCache {
    path: PathBuf,
}

impl AssistantIdCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached id, or `None` when the file does not exist.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let cached: CachedAssistant = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!(
                "assistant cache {} is malformed: {e}",
                self.path.display()
            ))
        })?;
        if cached.assistant_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(cached.assistant_id))
    }

    pub fn store(&self, assistant_id: &str) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_vec_pretty(&CachedAssistant {
            assistant_id: assistant_id.to_owned(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Return the cached assistant id, creating the assistant on first use.
///
/// A cached id is trusted as-is.
pub async fn ensure_assistant(
    runtime: &dyn AssistantRuntime,
    cfg: &AssistantConfig,
    cache: &AssistantIdCache,
) -> Result<String> {
    if let Some(id) = cache.load()? {
        tracing::info!(assistant_id = %id, "reusing cached assistant");
        return Ok(id);
    }

    let id = runtime.create_assistant(&assistant_spec(cfg)).await?;
    cache.store(&id)?;
    tracing::info!(
        assistant_id = %id,
        path = %cache.path().display(),
        "created assistant"
    );
    Ok(id)
}
