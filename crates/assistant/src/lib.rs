//! `tb-assistant`: client for the hosted assistant runtime.
//!
//! The runtime keeps conversation state server-side: a *session* (thread)
//! holds the messages, a *run* executes the assistant against it and may
//! pause asking for tool outputs.  This crate provides:
//!
//! - [`AssistantRuntime`], the seam the session driver talks to,
//! - [`OpenAiAssistants`], the REST adapter for the Assistants v2 API,
//! - the HR assistant definition (instructions + three tool schemas) and
//!   the on-disk cache of the created assistant id ([`definition`]).

pub mod definition;
pub mod openai;
pub mod runtime;

pub use definition::{ensure_assistant, AssistantIdCache};
pub use openai::OpenAiAssistants;
pub use runtime::{AssistantRuntime, AssistantSpec, RunSnapshot, RunStatus};
