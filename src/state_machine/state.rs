//! Conversation state types

use super::quiz::ExerciseState;
use crate::content::{ContentRepository, QuizQuestion};
use crate::profile::{SessionId, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of messages carried across persistence
pub const RECENT_MESSAGE_LIMIT: usize = 20;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Bot,
    User,
}

/// Presentation hint for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    General,
    Welcome,
    WelcomeBack,
    SessionMenu,
    Quiz,
    Celebration,
    User,
}

/// One row of the session menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub session_id: SessionId,
    pub title: String,
    pub unlocked: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuEntry>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn bot(id: u64, kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::Bot,
            text: text.into(),
            kind,
            menu: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.into(),
            kind: MessageKind::User,
            menu: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Coarse position in the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Welcome, diagnosis discussion, and session selection
    #[default]
    Intro,
    /// Working through a session's modules
    Content,
    /// Answering a quiz inside a session
    Quiz,
}

/// How the next user input will be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingResponse {
    Welcome,
    DiagnosisChoice,
    FreeformDiagnosisQuestion,
    PostSummaryChoice,
    ResumeSessionChoice,
    SessionSelect,
    SegmentDiscussion,
    ContentQuiz {
        questions: Vec<QuizQuestion>,
        question_index: usize,
    },
}

impl PendingResponse {
    pub fn name(&self) -> &'static str {
        match self {
            PendingResponse::Welcome => "welcome",
            PendingResponse::DiagnosisChoice => "diagnosis_choice",
            PendingResponse::FreeformDiagnosisQuestion => "freeform_diagnosis_question",
            PendingResponse::PostSummaryChoice => "post_summary_choice",
            PendingResponse::ResumeSessionChoice => "resume_session_choice",
            PendingResponse::SessionSelect => "session_select",
            PendingResponse::SegmentDiscussion => "segment_discussion",
            PendingResponse::ContentQuiz { .. } => "content_quiz",
        }
    }
}

/// Persisted per-user snapshot. Overwritten on every save.
///
/// Every field except `answer_options` is required: a partially shaped
/// snapshot fails to deserialize and is treated as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub current_session_id: Option<SessionId>,
    pub current_module_index: usize,
    pub current_segment_index: usize,
    pub phase: Phase,
    pub pending_response: Option<PendingResponse>,
    #[serde(default)]
    pub answer_options: Option<Vec<String>>,
    pub recent_messages: Vec<Message>,
    pub timestamp: DateTime<Utc>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            current_session_id: None,
            current_module_index: 0,
            current_segment_index: 0,
            phase: Phase::Intro,
            pending_response: None,
            answer_options: None,
            recent_messages: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

impl ConversationState {
    /// True for a conversation that has never been greeted
    pub fn is_fresh(&self) -> bool {
        self.recent_messages.is_empty()
            && self.pending_response.is_none()
            && self.current_session_id.is_none()
    }

    /// Append to the transcript, keeping only the most recent messages
    pub fn push_message(&mut self, message: Message) {
        self.recent_messages.push(message);
        if self.recent_messages.len() > RECENT_MESSAGE_LIMIT {
            let excess = self.recent_messages.len() - RECENT_MESSAGE_LIMIT;
            self.recent_messages.drain(..excess);
        }
    }

    /// Start a session at its first module
    pub fn enter_session(&mut self, session_id: SessionId) {
        self.current_session_id = Some(session_id);
        self.current_module_index = 0;
        self.current_segment_index = 0;
        self.phase = Phase::Content;
    }

    /// Leave the current session and reset the cursor
    pub fn leave_session(&mut self) {
        self.current_session_id = None;
        self.current_module_index = 0;
        self.current_segment_index = 0;
        self.phase = Phase::Intro;
    }
}

// ============================================================================
// Engine State and Context
// ============================================================================

/// Live engine state for one user
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatState {
    pub conversation: ConversationState,
    /// Quiz sub-state; never persisted
    pub exercise: Option<ExerciseState>,
    pub next_message_id: u64,
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            next_message_id: 1,
            ..Self::default()
        }
    }

    /// Rebuild live state from a persisted snapshot
    pub fn resume(conversation: ConversationState) -> Self {
        let next_message_id = conversation
            .recent_messages
            .iter()
            .map(|m| m.id)
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            conversation,
            exercise: None,
            next_message_id,
        }
    }

    pub fn pending(&self) -> Option<&PendingResponse> {
        self.conversation.pending_response.as_ref()
    }
}

/// Per-user context the transition function reads from
#[derive(Clone)]
pub struct ChatContext {
    pub user_id: String,
    /// Working copy of the user's profile
    pub profile: UserProfile,
    pub content: Arc<dyn ContentRepository>,
}

impl ChatContext {
    pub fn new(
        user_id: impl Into<String>,
        profile: UserProfile,
        content: Arc<dyn ContentRepository>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            profile,
            content,
        }
    }
}

impl std::fmt::Debug for ChatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatContext")
            .field("user_id", &self.user_id)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
