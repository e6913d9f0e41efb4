//! Message processing: the per-thread session driver and the pieces it
//! is built from.

pub mod cancel;
pub mod dedupe;
pub mod driver;
pub mod session_lock;
pub mod tools;

pub use driver::{DriverError, SessionDriver, UserDirectory, FAILURE_NOTICE};
