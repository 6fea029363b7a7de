//! Effects produced by state transitions

use super::state::Message;
use crate::profile::SessionId;
use serde_json::Value;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Persist the conversation snapshot
    PersistState,

    /// Write the working profile back to the user store
    PersistProfile,

    /// Append a completed-session record
    RecordSession { session_id: SessionId, data: Value },

    /// Show a bot message after `delay`
    NotifyMessage { message: Message, delay: Duration },

    /// Replace the answer options offered to the user
    NotifyOptions { options: Option<Vec<String>> },
}

impl Effect {
    pub fn notify_message(message: Message, delay: Duration) -> Self {
        Effect::NotifyMessage { message, delay }
    }

    /// The emitted message, if this effect carries one
    pub fn message(&self) -> Option<&Message> {
        match self {
            Effect::NotifyMessage { message, .. } => Some(message),
            _ => None,
        }
    }
}
