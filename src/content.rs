//! Curriculum content: sessions, modules, segments, and embedded quizzes
//!
//! Content is immutable at runtime. The engine reads it through
//! [`ContentRepository`], which also resolves personalized variants.

mod catalog;

pub use catalog::StaticContent;

use crate::profile::{SessionId, UserProfile};
use serde::{Deserialize, Serialize};

/// Catalog entry for a curriculum session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub unlocked: bool,
}

/// Module tree for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTree {
    pub title: String,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub title: String,
    pub body: ModuleBody,
}

/// A module is either a run of segments or one flat block of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModuleBody {
    Segments(Vec<Segment>),
    Flat(String),
}

impl Module {
    pub fn flat(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: ModuleBody::Flat(content.into()),
        }
    }

    pub fn segmented(title: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            title: title.into(),
            body: ModuleBody::Segments(segments),
        }
    }

    /// Segments of this module, or `None` when it should be shown as one block.
    /// An empty segment list counts as a flat module.
    pub fn segments(&self) -> Option<&[Segment]> {
        match &self.body {
            ModuleBody::Segments(segments) if !segments.is_empty() => Some(segments),
            _ => None,
        }
    }

    pub fn flat_text(&self) -> &str {
        match &self.body {
            ModuleBody::Flat(text) => text,
            ModuleBody::Segments(_) => "",
        }
    }
}

/// Smallest unit of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub content: String,
    /// Prompt that pauses traversal until the user responds
    #[serde(default)]
    pub discussion: Option<String>,
    #[serde(default)]
    pub discussion_options: Option<Vec<String>>,
    /// Quiz offered from the discussion branch
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

impl Segment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            discussion: None,
            discussion_options: None,
            quiz: Vec::new(),
        }
    }

    pub fn with_discussion(mut self, prompt: impl Into<String>, options: Vec<String>) -> Self {
        self.discussion = Some(prompt.into());
        self.discussion_options = Some(options);
        self
    }

    pub fn with_quiz(mut self, quiz: Vec<QuizQuestion>) -> Self {
        self.quiz = quiz;
        self
    }

    /// The discussion prompt, ignoring blank ones
    pub fn discussion_prompt(&self) -> Option<&str> {
        self.discussion
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }

    /// Options offered with the discussion prompt (`["Continue"]` if none declared)
    pub fn options(&self) -> Vec<String> {
        match &self.discussion_options {
            Some(options) if !options.is_empty() => options.clone(),
            _ => vec!["Continue".to_string()],
        }
    }
}

/// Multiple-choice question with exactly one correct option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
}

/// Read-only access to curriculum content
pub trait ContentRepository: Send + Sync {
    /// All sessions in display order
    fn sessions(&self) -> &[Session];

    /// Generic (non-personalized) module tree
    fn get_content(&self, session_id: SessionId) -> Option<ContentTree>;

    /// Variant tree for this profile, if one exists
    fn get_personalized_content(
        &self,
        session_id: SessionId,
        profile: &UserProfile,
    ) -> Option<ContentTree>;

    fn session(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions().iter().find(|s| s.id == session_id)
    }

    /// Personalized tree, falling back to the generic one
    fn resolve(&self, session_id: SessionId, profile: &UserProfile) -> Option<ContentTree> {
        self.get_personalized_content(session_id, profile)
            .or_else(|| self.get_content(session_id))
    }
}
