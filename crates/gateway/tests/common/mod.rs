//! Test doubles shared by the gateway integration tests: a scripted
//! assistant runtime, a recording notifier and a fixed user directory.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use tb_assistant::{AssistantIdCache, AssistantRuntime, AssistantSpec, RunSnapshot, RunStatus};
use tb_domain::config::{AssistantConfig, PollConfig, TicketsConfig};
use tb_domain::error::Result;
use tb_domain::notify::Notifier;
use tb_domain::tool::{ToolCall, ToolOutput};
use tb_gateway::runtime::{SessionDriver, UserDirectory};
use tb_sessions::ThreadMap;
use tb_slack::MessageEvent;
use tb_tickets::{AirtableStore, TicketDesk};

pub const ADMIN_CHANNEL: &str = "CHR";
pub const GENERAL_CHANNEL: &str = "CGEN";
pub const DISPLAY_NAME: &str = "Ada Lovelace";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted assistant runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the assistant does for one started run.
pub enum Turn {
    /// Completes straight away with this reply.
    Reply(&'static str),
    /// Asks for these tool calls, then completes with the reply.
    Tools(Vec<ToolCall>, &'static str),
    /// Never leaves `in_progress`.
    Stall,
    /// Asks for these tool calls again after every submission.
    EndlessTools(Vec<ToolCall>),
}

#[derive(Default)]
pub struct ScriptedRuntime {
    turns: Mutex<VecDeque<Turn>>,
    reply: Mutex<Option<String>>,
    endless: Mutex<Option<Vec<ToolCall>>>,
    runs: AtomicU32,
    pub assistants_created: AtomicU32,
    pub sessions_created: AtomicU32,
    pub user_messages: Mutex<Vec<(String, String)>>,
    pub submitted: Mutex<Vec<ToolOutput>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            ..Self::default()
        }
    }

    fn snapshot(id: &str, status: RunStatus, calls: Vec<ToolCall>) -> RunSnapshot {
        RunSnapshot {
            id: id.to_owned(),
            status,
            required_tool_calls: calls,
            last_error: None,
        }
    }
}

#[async_trait]
impl AssistantRuntime for ScriptedRuntime {
    async fn create_assistant(&self, _spec: &AssistantSpec) -> Result<String> {
        self.assistants_created.fetch_add(1, Ordering::SeqCst);
        Ok("asst_test".into())
    }

    async fn create_session(&self) -> Result<String> {
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(format!("thread_{n}"))
    }

    async fn add_user_message(&self, session_id: &str, text: &str) -> Result<()> {
        self.user_messages
            .lock()
            .push((session_id.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn start_run(&self, _session_id: &str, _assistant_id: &str) -> Result<RunSnapshot> {
        let id = format!("run_{}", self.runs.fetch_add(1, Ordering::SeqCst));
        let turn = self.turns.lock().pop_front().unwrap_or(Turn::Reply("(no script)"));
        Ok(match turn {
            Turn::Reply(text) => {
                *self.reply.lock() = Some(text.to_owned());
                Self::snapshot(&id, RunStatus::Completed, Vec::new())
            }
            Turn::Tools(calls, text) => {
                *self.reply.lock() = Some(text.to_owned());
                Self::snapshot(&id, RunStatus::RequiresAction, calls)
            }
            Turn::Stall => Self::snapshot(&id, RunStatus::Queued, Vec::new()),
            Turn::EndlessTools(calls) => {
                *self.endless.lock() = Some(calls.clone());
                Self::snapshot(&id, RunStatus::RequiresAction, calls)
            }
        })
    }

    async fn get_run(&self, _session_id: &str, run_id: &str) -> Result<RunSnapshot> {
        Ok(Self::snapshot(run_id, RunStatus::InProgress, Vec::new()))
    }

    async fn submit_tool_outputs(
        &self,
        _session_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunSnapshot> {
        self.submitted.lock().extend_from_slice(outputs);
        Ok(match self.endless.lock().clone() {
            Some(calls) => Self::snapshot(run_id, RunStatus::RequiresAction, calls),
            None => Self::snapshot(run_id, RunStatus::Completed, Vec::new()),
        })
    }

    async fn cancel_run(&self, _session_id: &str, run_id: &str) -> Result<()> {
        self.cancelled.lock().push(run_id.to_owned());
        Ok(())
    }

    async fn latest_assistant_reply(&self, _session_id: &str) -> Result<Option<String>> {
        Ok(self.reply.lock().clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat side
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub channel: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub posts: Mutex<Vec<Posted>>,
}

impl RecordingNotifier {
    pub fn to_channel(&self, channel: &str) -> Vec<Posted> {
        self.posts
            .lock()
            .iter()
            .filter(|p| p.channel == channel)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, channel: &str, text: &str, thread_ts: Option<&str>) {
        self.posts.lock().push(Posted {
            channel: channel.to_owned(),
            text: text.to_owned(),
            thread_ts: thread_ts.map(str::to_owned),
        });
    }
}

pub struct FixedDirectory;

#[async_trait]
impl UserDirectory for FixedDirectory {
    async fn display_name(&self, _user_id: &str) -> String {
        DISPLAY_NAME.into()
    }
}

pub fn message(channel: &str, ts: &str, thread_ts: Option<&str>, text: &str) -> MessageEvent {
    MessageEvent {
        channel: channel.into(),
        user: Some("U123".into()),
        text: text.into(),
        ts: ts.into(),
        thread_ts: thread_ts.map(str::to_owned),
        bot_id: None,
        subtype: None,
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        call_id: id.into(),
        tool_name: name.into(),
        arguments: args.to_string(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Harness {
    pub driver: Arc<SessionDriver>,
    pub runtime: Arc<ScriptedRuntime>,
    pub notifier: Arc<RecordingNotifier>,
    pub threads: Arc<ThreadMap>,
    pub state_dir: tempfile::TempDir,
}

/// Polling fast enough for tests; `max_polls` bounds stalled runs.
pub fn fast_poll(max_polls: u32, max_wait_secs: u64) -> PollConfig {
    PollConfig {
        initial_interval_ms: 5,
        max_interval_ms: 20,
        multiplier: 2.0,
        max_polls,
        max_wait_secs,
    }
}

/// Wire a driver over the scripted runtime and an Airtable store pointed
/// at `table_url`.
pub fn harness(turns: Vec<Turn>, table_url: &str, poll: PollConfig) -> Harness {
    let state_dir = tempfile::tempdir().unwrap();
    let threads = Arc::new(ThreadMap::open(state_dir.path()).unwrap());
    let runtime = Arc::new(ScriptedRuntime::new(turns));
    let notifier = Arc::new(RecordingNotifier::default());

    let tickets_cfg = TicketsConfig {
        table_url: table_url.into(),
        ..TicketsConfig::default()
    };
    let store = Arc::new(AirtableStore::new(&tickets_cfg, "key_test".into()).unwrap());
    let desk = Arc::new(TicketDesk::new(store, notifier.clone(), ADMIN_CHANNEL));

    let assistant_cfg = AssistantConfig {
        poll,
        ..AssistantConfig::default()
    };
    let cache = AssistantIdCache::new(state_dir.path().join("assistant.json"));

    let driver = Arc::new(SessionDriver::new(
        threads.clone(),
        runtime.clone(),
        desk,
        notifier.clone(),
        Arc::new(FixedDirectory),
        assistant_cfg,
        cache,
    ));

    Harness {
        driver,
        runtime,
        notifier,
        threads,
        state_dir,
    }
}
