//! Shared types for the ticketbridge workspace: configuration, the common
//! error type, ticket and tool-call models, trace events and the
//! notification seam implemented by the chat adapter.

pub mod config;
pub mod error;
pub mod notify;
pub mod ticket;
pub mod tool;
pub mod trace;
