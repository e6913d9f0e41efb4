//! `tb-gateway`: the ticketbridge service.
//!
//! Receives Slack Events API deliveries, drives each message through an
//! assistant run (dispatching ticket tools along the way) and posts the
//! reply back into the originating thread.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
