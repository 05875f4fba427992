//! Probe-progression state machine for the respondent side
//!
//! Pure transitions in the Elm Architecture style: the runtime feeds events in,
//! applies the returned state, and executes the returned effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{RespondentState, Session, SessionPhase};
pub use transition::{transition, TransitionError, TransitionResult};
