//! Intent rules for each pending response
//!
//! Matching is deliberately plain substring search. Each classifier is the
//! complete rule table for one `PendingResponse` variant; rules are tried in
//! the order listed and the first match wins. `None` means the input matched
//! nothing and the caller asks the user to rephrase.
//!
//! | Pending                       | Rule (case-insensitive)            | Intent            |
//! |-------------------------------|------------------------------------|-------------------|
//! | welcome                       | "understand" and "diagnosis"       | `UnderstandDiagnosis` |
//! | welcome                       | "start" and "guide"                | `StartGuide`      |
//! | diagnosis_choice              | "summary"                          | `Summary`         |
//! | diagnosis_choice              | anything else                      | `AskQuestion`     |
//! | freeform_diagnosis_question   | "start" and "guide"                | `StartGuide`      |
//! | freeform_diagnosis_question   | anything else                      | `Question`        |
//! | post_summary_choice           | "guide"                            | `StartGuide`      |
//! | post_summary_choice           | "strateg"                          | `Strategies`      |
//! | resume_session_choice         | "highlight"                        | `Highlight`       |
//! | resume_session_choice         | "continue"                         | `Continue`        |
//! | resume_session_choice         | "new"                              | `NewSession`      |
//! | session_select                | first number naming a session      | session id        |
//! | segment_discussion            | "yes" and "test"                   | `TakeQuiz`        |
//! | segment_discussion            | "no"                               | `Decline`         |
//! | segment_discussion            | "continue" or "next"               | `Advance`         |
//! | segment_discussion            | "learn more" or "mci itself"       | `Topic(AboutMci)` |
//! | segment_discussion            | "prevention"                       | `Topic(Prevention)` |
//! | segment_discussion            | "status"                           | `Topic(Status)`   |
//! | segment_discussion            | "goal"                             | `Topic(Goal)`     |
//! | content_quiz                  | number 1..=N                       | option index      |

use crate::profile::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeIntent {
    UnderstandDiagnosis,
    StartGuide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisIntent {
    Summary,
    AskQuestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeformIntent {
    StartGuide,
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFollowUp {
    StartGuide,
    Strategies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeIntent {
    Highlight,
    Continue,
    NewSession,
}

/// Named branches of the segment discussion menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    AboutMci,
    Prevention,
    Status,
    Goal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscussionIntent {
    TakeQuiz,
    Decline,
    Advance,
    Topic(Topic),
}

/// Lowercased input with helpers for the rule tables
struct Input(String);

impl Input {
    fn new(text: &str) -> Self {
        Self(text.to_lowercase())
    }

    fn has(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }

    fn has_all(&self, needles: &[&str]) -> bool {
        needles.iter().all(|n| self.has(n))
    }
}

pub fn classify_welcome(text: &str) -> Option<WelcomeIntent> {
    let input = Input::new(text);
    if input.has_all(&["understand", "diagnosis"]) {
        Some(WelcomeIntent::UnderstandDiagnosis)
    } else if input.has_all(&["start", "guide"]) {
        Some(WelcomeIntent::StartGuide)
    } else {
        None
    }
}

pub fn classify_diagnosis_choice(text: &str) -> DiagnosisIntent {
    if Input::new(text).has("summary") {
        DiagnosisIntent::Summary
    } else {
        DiagnosisIntent::AskQuestion
    }
}

pub fn classify_freeform(text: &str) -> FreeformIntent {
    if Input::new(text).has_all(&["start", "guide"]) {
        FreeformIntent::StartGuide
    } else {
        FreeformIntent::Question
    }
}

pub fn classify_summary_follow_up(text: &str) -> Option<SummaryFollowUp> {
    let input = Input::new(text);
    if input.has("guide") {
        Some(SummaryFollowUp::StartGuide)
    } else if input.has("strateg") {
        Some(SummaryFollowUp::Strategies)
    } else {
        None
    }
}

pub fn classify_resume(text: &str) -> Option<ResumeIntent> {
    let input = Input::new(text);
    if input.has("highlight") {
        Some(ResumeIntent::Highlight)
    } else if input.has("continue") {
        Some(ResumeIntent::Continue)
    } else if input.has("new") {
        Some(ResumeIntent::NewSession)
    } else {
        None
    }
}

/// "No" is checked before the named branches, so "No, continue to other
/// options" re-presents the menu rather than advancing.
pub fn classify_discussion(text: &str) -> Option<DiscussionIntent> {
    let input = Input::new(text);
    if input.has_all(&["yes", "test"]) {
        Some(DiscussionIntent::TakeQuiz)
    } else if input.has("no") {
        Some(DiscussionIntent::Decline)
    } else if input.has("continue") || input.has("next") {
        Some(DiscussionIntent::Advance)
    } else if input.has("learn more") || input.has("mci itself") {
        Some(DiscussionIntent::Topic(Topic::AboutMci))
    } else if input.has("prevention") {
        Some(DiscussionIntent::Topic(Topic::Prevention))
    } else if input.has("status") {
        Some(DiscussionIntent::Topic(Topic::Status))
    } else if input.has("goal") {
        Some(DiscussionIntent::Topic(Topic::Goal))
    } else {
        None
    }
}

/// Session id named by the first number in the text, if it is one of `known`
pub fn parse_session_choice(text: &str, known: &[SessionId]) -> Option<SessionId> {
    first_number(text).filter(|id| known.contains(id))
}

/// Zero-based option index from a 1-based position in the text
pub fn parse_option_number(text: &str, option_count: usize) -> Option<usize> {
    let position = usize::try_from(first_number(text)?).ok()?;
    (1..=option_count)
        .contains(&position)
        .then(|| position - 1)
}

fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
