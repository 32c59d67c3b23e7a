//! Voice interaction state machine
//!
//! Elm-style: a pure `transition` maps (state, conversation, event) to a new
//! state plus effects. The runtime owns the state and performs the effects.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, FailureSource};
pub use event::Event;
pub use state::InteractionState;
pub use transition::{transition, TransitionError, TransitionResult};
