//! Assistant session driver.
//!
//! One inbound chat message is driven through:
//!
//! 1. **Resolve**: look the thread up in the [`ThreadMap`]; on a miss,
//!    create a session and bind it.
//! 2. **Submit**: append the text as a user turn and start a run of the
//!    HR assistant (created once per process, cached on disk).
//! 3. **Run**: poll with exponential back-off.  When the run asks for tool
//!    outputs, dispatch every pending call and submit all outputs in one
//!    batch, then reset the interval.  The loop is bounded by a count of
//!    round trips (polls and tool submissions), a wall-clock limit and the
//!    thread's cancel token; on any of those the run is cancelled remotely.
//! 4. **Reply**: post the newest assistant message into the thread.
//!
//! Work is serialized per thread by [`ThreadLocks`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use tb_assistant::{ensure_assistant, AssistantIdCache, AssistantRuntime, RunSnapshot, RunStatus};
use tb_domain::config::{AssistantConfig, PollConfig};
use tb_domain::error::Error;
use tb_domain::notify::Notifier;
use tb_domain::trace::TraceEvent;
use tb_sessions::{ThreadKey, ThreadMap};
use tb_slack::MessageEvent;
use tb_tickets::{Caller, TicketDesk};

use super::cancel::{CancelMap, CancelToken};
use super::session_lock::ThreadLocks;
use super::tools::{dispatch_all, ToolContext};

/// Posted into the thread when a message could not be answered.
pub const FAILURE_NOTICE: &str =
    "Sorry, I could not finish handling that request. Please try again in a moment.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Seams
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolves a chat user id to the name recorded on tickets.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Never fails; unknown users get a placeholder name.
    async fn display_name(&self, user_id: &str) -> String;
}

#[async_trait]
impl UserDirectory for tb_slack::SlackClient {
    async fn display_name(&self, user_id: &str) -> String {
        tb_slack::SlackClient::display_name(self, user_id).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("run {run_id} did not finish after {polls} polls ({elapsed_ms} ms)")]
    RunTimedOut {
        run_id: String,
        polls: u32,
        elapsed_ms: u64,
    },

    #[error("run {run_id} was cancelled")]
    RunCancelled { run_id: String },

    #[error("run {run_id} ended as {status}: {message}")]
    RunFailed {
        run_id: String,
        status: String,
        message: String,
    },

    #[error(transparent)]
    Runtime(#[from] Error),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionDriver {
    threads: Arc<ThreadMap>,
    runtime: Arc<dyn AssistantRuntime>,
    desk: Arc<TicketDesk>,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn UserDirectory>,
    assistant_cfg: AssistantConfig,
    assistant_cache: AssistantIdCache,
    assistant_id: OnceCell<String>,
    locks: ThreadLocks,
    cancels: CancelMap,
}

impl SessionDriver {
    pub fn new(
        threads: Arc<ThreadMap>,
        runtime: Arc<dyn AssistantRuntime>,
        desk: Arc<TicketDesk>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn UserDirectory>,
        assistant_cfg: AssistantConfig,
        assistant_cache: AssistantIdCache,
    ) -> Self {
        Self {
            threads,
            runtime,
            desk,
            notifier,
            directory,
            assistant_cfg,
            assistant_cache,
            assistant_id: OnceCell::new(),
            locks: ThreadLocks::new(),
            cancels: CancelMap::new(),
        }
    }

    pub fn cancels(&self) -> &CancelMap {
        &self.cancels
    }

    pub fn locks(&self) -> &ThreadLocks {
        &self.locks
    }

    /// Drive one message and report failures into its thread.
    pub async fn process(&self, msg: MessageEvent) {
        let key = ThreadKey::for_message(&msg.channel, &msg.ts, msg.thread_ts.as_deref());
        if let Err(e) = self.handle(&msg).await {
            tracing::error!(thread_key = %key, error = %e, "message handling failed");
            self.notifier
                .post(&msg.channel, FAILURE_NOTICE, Some(key.thread_ts()))
                .await;
        }
    }

    /// Drive one message to a posted reply.
    pub async fn handle(&self, msg: &MessageEvent) -> Result<(), DriverError> {
        let key = ThreadKey::for_message(&msg.channel, &msg.ts, msg.thread_ts.as_deref());
        let _guard = self.locks.acquire(key.as_str()).await;

        let session_id = self.resolve_session(&key).await?;
        self.runtime.add_user_message(&session_id, &msg.text).await?;

        let assistant_id = self.assistant_id().await?;
        let run = self.runtime.start_run(&session_id, &assistant_id).await?;
        tracing::debug!(thread_key = %key, session_id = %session_id, run_id = %run.id, "run started");

        let ctx = ToolContext {
            caller: Caller::new(&msg.channel, Some(key.thread_ts().to_owned())),
            user_id: msg.user.clone().unwrap_or_default(),
            directory: self.directory.clone(),
        };

        let token = self.cancels.register(key.as_str());
        let outcome = self.drive_run(&session_id, run, &ctx, &token).await;
        self.cancels.remove(key.as_str());
        outcome?;

        match self.runtime.latest_assistant_reply(&session_id).await? {
            Some(reply) => {
                self.notifier
                    .post(&msg.channel, &reply, Some(key.thread_ts()))
                    .await;
            }
            None => tracing::warn!(thread_key = %key, session_id = %session_id, "run completed without a reply"),
        }
        Ok(())
    }

    async fn resolve_session(&self, key: &ThreadKey) -> Result<String, DriverError> {
        if let Some(id) = self.threads.lookup(key) {
            return Ok(id);
        }
        let id = self.runtime.create_session().await?;
        self.threads.bind(key, &id)?;
        tracing::info!(thread_key = %key, session_id = %id, "new session bound");
        Ok(id)
    }

    async fn assistant_id(&self) -> Result<String, DriverError> {
        let id = self
            .assistant_id
            .get_or_try_init(|| {
                ensure_assistant(
                    self.runtime.as_ref(),
                    &self.assistant_cfg,
                    &self.assistant_cache,
                )
            })
            .await?;
        Ok(id.clone())
    }

    /// Poll `run` until it completes, fails, times out or is cancelled.
    ///
    /// Tool submissions count as round trips alongside polls, so a run
    /// that keeps asking for tools is bounded by the same limits.
    async fn drive_run(
        &self,
        session_id: &str,
        mut run: RunSnapshot,
        ctx: &ToolContext,
        token: &CancelToken,
    ) -> Result<RunSnapshot, DriverError> {
        let poll = &self.assistant_cfg.poll;
        let started = Instant::now();
        let max_wait = Duration::from_secs(poll.max_wait_secs);
        let mut backoff = Backoff::new(poll);
        let mut polls: u32 = 0;

        loop {
            match run.status {
                RunStatus::Completed => {
                    finished(session_id, &run, polls, started);
                    return Ok(run);
                }
                status if status.is_failure() => {
                    finished(session_id, &run, polls, started);
                    return Err(DriverError::RunFailed {
                        run_id: run.id,
                        status: status.as_str().to_owned(),
                        message: run.last_error.unwrap_or_else(|| "no error detail".into()),
                    });
                }
                _ => {}
            }

            if token.is_cancelled() {
                self.abandon(session_id, &run.id).await;
                finished(session_id, &run, polls, started);
                return Err(DriverError::RunCancelled { run_id: run.id });
            }

            let elapsed = started.elapsed();
            if polls >= poll.max_polls || elapsed >= max_wait {
                self.abandon(session_id, &run.id).await;
                finished(session_id, &run, polls, started);
                return Err(DriverError::RunTimedOut {
                    run_id: run.id,
                    polls,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            if run.status == RunStatus::RequiresAction && !run.required_tool_calls.is_empty() {
                let outputs =
                    dispatch_all(&self.desk, &run.required_tool_calls, ctx, session_id, &run.id)
                        .await;
                polls += 1;
                run = self
                    .runtime
                    .submit_tool_outputs(session_id, &run.id, &outputs)
                    .await?;
                backoff.reset();
                continue;
            }

            let wait = backoff.next().min(max_wait - elapsed);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = token.cancelled() => continue,
            }

            polls += 1;
            run = self.runtime.get_run(session_id, &run.id).await?;
        }
    }

    /// Best-effort remote cancel of a run we stopped waiting for.
    async fn abandon(&self, session_id: &str, run_id: &str) {
        if let Err(e) = self.runtime.cancel_run(session_id, run_id).await {
            tracing::warn!(session_id, run_id, error = %e, "remote run cancel failed");
        }
    }
}

fn finished(session_id: &str, run: &RunSnapshot, polls: u32, started: Instant) {
    TraceEvent::RunFinished {
        session_id: session_id.to_owned(),
        run_id: run.id.clone(),
        status: run.status.as_str().to_owned(),
        polls,
        duration_ms: started.elapsed().as_millis() as u64,
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Back-off
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Poll interval schedule: `initial`, `initial * m`, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(cfg: &PollConfig) -> Self {
        let initial = Duration::from_millis(cfg.initial_interval_ms);
        Self {
            initial,
            max: Duration::from_millis(cfg.max_interval_ms.max(cfg.initial_interval_ms)),
            multiplier: cfg.multiplier.max(1.0),
            current: initial,
        }
    }

    /// The wait before the next poll; advances the schedule.
    pub fn next(&mut self) -> Duration {
        let wait = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max));
        wait
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
