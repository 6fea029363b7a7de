//! Events that drive the dialogue

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The user opened (or switched to) their conversation
    Open,
    /// Raw text from the input box or a clicked answer option
    UserResponse { text: String },
}

impl Event {
    pub fn user_response(text: impl Into<String>) -> Self {
        Event::UserResponse { text: text.into() }
    }
}
