//! As-you-type search sessions: debouncing and stale-result suppression.

pub mod controller;
pub mod machine;

pub use controller::{SessionController, SessionEvent, SessionHandle};
pub use machine::{Effect, QueryTicket, SessionMachine, SessionPhase};
