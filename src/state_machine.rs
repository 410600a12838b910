//! Fire session workflow state machine
//!
//! Pure transitions over a session record. Effects are returned to the
//! runtime, which performs persistence and auditing.

pub mod action;
mod effect;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use action::{Action, ActionKind};
pub use effect::Effect;
pub use state::{FireSession, NewSession, SessionState, Zone};
pub use transition::{transition, TransitionError};
