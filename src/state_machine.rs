//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod intents;
pub mod quiz;
pub mod state;
pub(crate) mod transition;
mod traversal;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
#[allow(unused_imports)] // Public API re-exports
pub use state::{
    ChatContext, ChatState, ConversationState, Message, MessageKind, PendingResponse, Phase,
};
#[allow(unused_imports)]
pub use transition::{transition, TransitionError, TransitionResult, WELCOME_OPTIONS};
