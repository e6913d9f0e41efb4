//! Tool dispatch for assistant runs.
//!
//! Every tool call gets exactly one output string.  Desk failures
//! (unauthorized, not found, store errors) are ordinary outputs that the
//! assistant phrases for the user; unknown tools and malformed arguments
//! get an explicit error output so the run can always move on.

use std::sync::Arc;

use serde::Deserialize;

use tb_assistant::definition::{TOOL_CREATE_TICKET, TOOL_LIST_TICKETS, TOOL_UPDATE_STATUS};
use tb_domain::ticket::{NewTicket, Priority};
use tb_domain::tool::{ToolCall, ToolOutput};
use tb_domain::trace::TraceEvent;
use tb_tickets::{Caller, TicketDesk};

use super::driver::UserDirectory;

/// Who is talking, for the duration of one run.
pub struct ToolContext {
    pub caller: Caller,
    pub user_id: String,
    pub directory: Arc<dyn UserDirectory>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Arguments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct CreateTicketArgs {
    ticket_title: String,
    ticket_details: String,
    priority: String,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusArgs {
    title: String,
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, raw: &str) -> Result<T, String> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| format!("invalid arguments for {tool}: {e}"))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one tool call.  Returns `(output, is_error)`.
pub async fn dispatch_tool(desk: &TicketDesk, call: &ToolCall, ctx: &ToolContext) -> (String, bool) {
    match call.tool_name.as_str() {
        TOOL_CREATE_TICKET => dispatch_create(desk, &call.arguments, ctx).await,
        TOOL_LIST_TICKETS => dispatch_list(desk, ctx).await,
        TOOL_UPDATE_STATUS => dispatch_update(desk, &call.arguments, ctx).await,
        other => {
            tracing::warn!(tool = other, "assistant requested an unknown tool");
            (
                format!(
                    "Unknown tool '{other}'. Available tools: {TOOL_CREATE_TICKET}, \
                     {TOOL_LIST_TICKETS}, {TOOL_UPDATE_STATUS}."
                ),
                true,
            )
        }
    }
}

/// Dispatch every pending call in order and pair each with its output.
pub async fn dispatch_all(
    desk: &TicketDesk,
    calls: &[ToolCall],
    ctx: &ToolContext,
    session_id: &str,
    run_id: &str,
) -> Vec<ToolOutput> {
    let mut outputs = Vec::with_capacity(calls.len());
    for call in calls {
        let (output, is_error) = dispatch_tool(desk, call, ctx).await;
        TraceEvent::ToolDispatched {
            session_id: session_id.to_owned(),
            run_id: run_id.to_owned(),
            tool_name: call.tool_name.clone(),
            is_error,
        }
        .emit();
        outputs.push(ToolOutput {
            call_id: call.call_id.clone(),
            output,
        });
    }
    outputs
}

async fn dispatch_create(desk: &TicketDesk, raw: &str, ctx: &ToolContext) -> (String, bool) {
    let args: CreateTicketArgs = match parse_args(TOOL_CREATE_TICKET, raw) {
        Ok(a) => a,
        Err(e) => return (e, true),
    };
    let priority: Priority = match args.priority.parse() {
        Ok(p) => p,
        Err(e) => return (e, true),
    };
    let ticket = NewTicket {
        title: args.ticket_title,
        details: args.ticket_details,
        priority,
    };

    let created_by = ctx.directory.display_name(&ctx.user_id).await;
    match desk.create_ticket(&ticket, &created_by).await {
        Ok(created) => match serde_json::to_string(&created) {
            Ok(json) => (json, false),
            Err(e) => (format!("ticket created but could not be encoded: {e}"), true),
        },
        Err(e) => (e.to_string(), true),
    }
}

async fn dispatch_list(desk: &TicketDesk, ctx: &ToolContext) -> (String, bool) {
    match desk.list_pending(&ctx.caller).await {
        Ok(tickets) => match serde_json::to_string(&tickets) {
            Ok(json) => (json, false),
            Err(e) => (format!("tickets could not be encoded: {e}"), true),
        },
        Err(e) => (e.to_string(), true),
    }
}

async fn dispatch_update(desk: &TicketDesk, raw: &str, ctx: &ToolContext) -> (String, bool) {
    let args: UpdateStatusArgs = match parse_args(TOOL_UPDATE_STATUS, raw) {
        Ok(a) => a,
        Err(e) => return (e, true),
    };
    match desk.update_status(&args.title, &ctx.caller).await {
        Ok(msg) => (msg, false),
        Err(e) => (e.to_string(), true),
    }
}
