//! Thread-to-session bindings for ticketbridge.
//!
//! Every chat thread that talks to the bot is bound to exactly one
//! assistant session.  Bindings are created on the first message of a
//! thread and kept forever in a small JSON file under the state directory.

pub mod thread_key;
pub mod thread_map;

pub use thread_key::ThreadKey;
pub use thread_map::{ThreadBinding, ThreadMap};
