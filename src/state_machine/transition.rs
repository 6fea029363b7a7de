//! Pure state transition function
//!
//! Every input is interpreted against the single active `PendingResponse`.
//! Handlers work on a [`Turn`], which collects emitted messages and effects
//! and lends out a copy-on-write profile so unchanged profiles are never
//! written back.

use super::intents::{
    classify_diagnosis_choice, classify_discussion, classify_freeform, classify_resume,
    classify_summary_follow_up, classify_welcome, parse_session_choice, DiagnosisIntent,
    DiscussionIntent, FreeformIntent, ResumeIntent, SummaryFollowUp, Topic, WelcomeIntent,
};
use super::state::{ChatContext, ChatState, Message, MessageKind, PendingResponse};
use super::{quiz, traversal, Effect, Event};
use crate::profile::UserProfile;
use chrono::Utc;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

pub const WELCOME_OPTIONS: [&str; 2] = ["Understand My Diagnosis", "Start My Brain Health Guide"];
pub const WELCOME_BACK_OPTIONS: [&str; 3] = [
    "Highlight what I've learned",
    "Continue where I left off",
    "Start a new session",
];
const DIAGNOSIS_OPTIONS: [&str; 2] = ["Ask a specific question", "Provide a summary and key insights"];
const SUMMARY_OPTIONS: [&str; 2] = ["Explore specific strategies", "Start brain health guide"];

const GUIDANCE: &str =
    "You can start by choosing 'Understand My Diagnosis' or 'Start My Brain Health Guide'.";
const CLARIFICATION: &str = "I didn't quite understand that. Could you please rephrase?";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    /// Updated working profile, present only when the turn changed it
    pub profile: Option<UserProfile>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            profile: None,
            effects: vec![],
        }
    }

    pub fn with_profile(mut self, profile: Option<UserProfile>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// Bot messages emitted by this turn, in order
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.effects.iter().filter_map(Effect::message)
    }

    /// Options offered with the pending response after this turn
    pub fn options(&self) -> Option<&[String]> {
        self.new_state.conversation.answer_options.as_deref()
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Response text is empty")]
    EmptyInput,
}

/// Working state for one transition
pub(crate) struct Turn<'a> {
    pub state: ChatState,
    pub context: &'a ChatContext,
    pub profile: Cow<'a, UserProfile>,
    effects: Vec<Effect>,
    /// Delay applied to the next emitted message
    delay: Duration,
}

impl<'a> Turn<'a> {
    pub fn new(state: &ChatState, context: &'a ChatContext) -> Self {
        Self {
            state: state.clone(),
            context,
            profile: Cow::Borrowed(&context.profile),
            effects: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn next_message_id(&mut self) -> u64 {
        let id = self.state.next_message_id;
        self.state.next_message_id += 1;
        id
    }

    pub fn say(&mut self, text: impl Into<String>) {
        self.say_as(MessageKind::General, text);
    }

    pub fn say_as(&mut self, kind: MessageKind, text: impl Into<String>) {
        let id = self.next_message_id();
        self.emit(Message::bot(id, kind, text));
    }

    /// Append a prepared bot message, consuming any pending pause
    pub fn emit(&mut self, message: Message) {
        let delay = std::mem::take(&mut self.delay);
        self.state.conversation.push_message(message.clone());
        self.effects.push(Effect::notify_message(message, delay));
    }

    /// Delay the next emission. Consecutive pauses add up.
    pub fn pause(&mut self, delay: Duration) {
        self.delay += delay;
    }

    pub fn await_response(&mut self, pending: PendingResponse, options: Option<Vec<String>>) {
        self.state.conversation.pending_response = Some(pending);
        self.state.conversation.answer_options = options;
    }

    pub fn clear(&mut self) {
        self.state.conversation.pending_response = None;
        self.state.conversation.answer_options = None;
    }

    /// Ask for a rephrase; the pending response is left as it was
    pub fn clarify(&mut self) {
        self.say(CLARIFICATION);
    }

    pub fn record_user(&mut self, text: &str) {
        let id = self.next_message_id();
        self.state.conversation.push_message(Message::user(id, text));
    }

    pub fn profile_mut(&mut self) -> &mut UserProfile {
        self.profile.to_mut()
    }

    pub fn push_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn finish(self) -> TransitionResult {
        let mut state = self.state;
        state.conversation.timestamp = Utc::now();
        let options = state.conversation.answer_options.clone();
        let profile = match self.profile {
            Cow::Owned(profile) => Some(profile),
            Cow::Borrowed(_) => None,
        };

        TransitionResult::new(state)
            .with_profile(profile)
            .with_effects(self.effects)
            .with_effect(Effect::PersistState)
            .with_effect(Effect::NotifyOptions { options })
    }
}

/// Pure transition function
///
/// Given the same state, context, and event this produces the same
/// messages and effects; the runtime performs all I/O.
pub fn transition(
    state: &ChatState,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut turn = Turn::new(state, context);

    match event {
        Event::Open => greet(&mut turn),
        Event::UserResponse { text } => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            let fresh = turn.state.conversation.is_fresh();
            turn.record_user(text);
            if fresh {
                greet(&mut turn);
            } else {
                respond(&mut turn, text);
            }
        }
    }

    Ok(turn.finish())
}

fn greet(turn: &mut Turn<'_>) {
    if let Some(session_id) = turn.state.conversation.current_session_id {
        turn.say_as(
            MessageKind::WelcomeBack,
            format!(
                "Welcome back to your About Me Brain Health Companion! I see you've been making progress through the sessions.\n\n\
                 Would you like me to:\n\
                 1. Highlight what you've learned so far based on your responses\n\
                 2. Pick up where you left off in Session {session_id}\n\
                 3. Start a new session"
            ),
        );
        turn.await_response(
            PendingResponse::ResumeSessionChoice,
            Some(strings(&WELCOME_BACK_OPTIONS)),
        );
        return;
    }

    let profile = &turn.profile;
    let mut welcome = format!(
        "Welcome to your About Me Brain Health Companion. My mission is to give you the personalized insights you need to optimize your brain health and quality of life while aging.\n\n\
         Your {} recently sent your recent cognitive assessment to me so you can ask me questions about your assessment and I can personalize the brain health education and guidance I provide to you.",
        profile.primary_clinician()
    );
    if profile.has_mci() {
        let _ = write!(
            welcome,
            "\n\nFrom your recent assessment at the {}, I see that you've been diagnosed with Mild Cognitive Impairment. Your overall cognitive score of {} shows many preserved strengths we can build on.",
            profile.clinic_name(),
            profile.ace_total_display()
        );
    }
    welcome.push_str(
        "\n\nI see this is your first time using me, your Companion. I can help you understand your diagnosis and your options for minimizing the impact of your diagnosis or I can walk you through a brain health guide I've personalized for you to help you minimize cognitive decline while you age. You can also get started by simply asking me any question that comes to mind. Where would you like to begin?",
    );

    turn.say_as(MessageKind::Welcome, welcome);
    turn.await_response(PendingResponse::Welcome, Some(strings(&WELCOME_OPTIONS)));
}

fn respond(turn: &mut Turn<'_>, text: &str) {
    let Some(pending) = turn.state.pending().cloned() else {
        turn.say(GUIDANCE);
        return;
    };
    tracing::debug!(user_id = %turn.context.user_id, pending = pending.name(), "Handling response");

    match pending {
        PendingResponse::Welcome => match classify_welcome(text) {
            Some(WelcomeIntent::UnderstandDiagnosis) => {
                turn.say("I can help you understand your diagnosis. Would you like to ask me a specific question about your assessment or diagnosis, or would you prefer I provide you with a summary and key insights from your cognitive assessment?");
                turn.await_response(
                    PendingResponse::DiagnosisChoice,
                    Some(strings(&DIAGNOSIS_OPTIONS)),
                );
            }
            Some(WelcomeIntent::StartGuide) => traversal::show_session_menu(turn),
            None => turn.clarify(),
        },

        PendingResponse::DiagnosisChoice => match classify_diagnosis_choice(text) {
            DiagnosisIntent::Summary => summarize_diagnosis(turn),
            DiagnosisIntent::AskQuestion => {
                turn.say("Please go ahead and ask me any question about your cognitive assessment or diagnosis.");
                turn.await_response(PendingResponse::FreeformDiagnosisQuestion, None);
            }
        },

        PendingResponse::FreeformDiagnosisQuestion => match classify_freeform(text) {
            FreeformIntent::StartGuide => traversal::show_session_menu(turn),
            FreeformIntent::Question => acknowledge_question(turn, text),
        },

        PendingResponse::PostSummaryChoice => match classify_summary_follow_up(text) {
            Some(SummaryFollowUp::StartGuide) => traversal::show_session_menu(turn),
            Some(SummaryFollowUp::Strategies) => suggest_strategies(turn),
            None => turn.clarify(),
        },

        PendingResponse::ResumeSessionChoice => match classify_resume(text) {
            Some(ResumeIntent::Highlight) => highlight_progress(turn),
            Some(ResumeIntent::Continue) => resume_session(turn),
            Some(ResumeIntent::NewSession) => traversal::show_session_menu(turn),
            None => turn.clarify(),
        },

        PendingResponse::SessionSelect => select_session(turn, text),

        PendingResponse::SegmentDiscussion => match classify_discussion(text) {
            Some(DiscussionIntent::TakeQuiz) => take_quiz(turn),
            Some(DiscussionIntent::Decline) => {
                traversal::present_branch_menu(turn, traversal::BRANCH_PROMPT);
            }
            Some(DiscussionIntent::Advance) => traversal::advance_past_segment(turn),
            Some(DiscussionIntent::Topic(topic)) => {
                discuss_topic(turn, topic);
                traversal::present_branch_menu(turn, traversal::BRANCH_PROMPT);
            }
            None => turn.clarify(),
        },

        PendingResponse::ContentQuiz {
            questions,
            question_index,
        } => quiz::submit_answer(turn, &questions, question_index, text),
    }
}

fn summarize_diagnosis(turn: &mut Turn<'_>) {
    let profile = &turn.profile;
    let summary = format!(
        "Based on your cognitive assessment conducted on {date}, here's a comprehensive summary of your results:\n\n\
         **Your Diagnosis:** {diagnosis}\n\n\
         **Overall Cognitive Performance:**\n\
         You scored {score}/100 on the ACE-III cognitive assessment. This is an excellent score that shows many of your cognitive abilities remain well-preserved.\n\n\
         **Key Insights:**\n\
         1. Your high overall score shows significant cognitive reserve\n\
         2. Your perfect or near-perfect scores in several domains are strengths to build on\n\
         3. The specific challenges you face have practical solutions\n\
         4. Your long period of stability suggests a favorable prognosis with proper management\n\n\
         Would you like to explore specific strategies for your challenges, or would you prefer to start with the brain health guide?",
        date = profile.assessment_date(),
        diagnosis = profile.diagnosis_text(),
        score = profile.ace_total_score(),
    );
    turn.say(summary);
    turn.await_response(PendingResponse::PostSummaryChoice, Some(strings(&SUMMARY_OPTIONS)));
}

fn acknowledge_question(turn: &mut Turn<'_>, question: &str) {
    let reply = format!(
        "You asked: \"{question}\"\n\n\
         That's a good question to bring to {clinician} at the {clinic}, who can answer it with your full assessment in front of them. \
         In the meantime, the brain health guide covers many of these topics in detail. Feel free to ask another question, or start the guide whenever you're ready.",
        clinician = turn.profile.primary_clinician(),
        clinic = turn.profile.clinic_name(),
    );
    turn.say(reply);
    turn.await_response(
        PendingResponse::FreeformDiagnosisQuestion,
        Some(vec![WELCOME_OPTIONS[1].to_string()]),
    );
}

fn suggest_strategies(turn: &mut Turn<'_>) {
    let mut reply = String::from("Here are some strategies focused on the areas your assessment suggests could use the most support:\n");
    let domains = turn.profile.domains_by_strength();
    if domains.is_empty() {
        reply.push_str("\n- Keep a consistent daily routine, stay physically active, and stay socially connected.");
    }
    for (domain, score) in domains.iter().take(2) {
        let _ = write!(reply, "\n- **{domain}** ({score}): {}", domain_tip(domain));
    }
    reply.push_str("\n\nThe brain health guide builds on each of these step by step.");

    turn.say(reply);
    turn.await_response(
        PendingResponse::PostSummaryChoice,
        Some(vec![SUMMARY_OPTIONS[1].to_string()]),
    );
}

fn domain_tip(domain: &str) -> &'static str {
    let domain = domain.to_lowercase();
    if domain.contains("memory") {
        "Use one notebook or calendar app for appointments and to-dos, and link new information to something you already know."
    } else if domain.contains("fluency") {
        "Word games, crosswords, and naming categories against a timer give word retrieval regular practice."
    } else if domain.contains("language") {
        "Reading aloud and talking through the day's news with someone keeps language skills active."
    } else if domain.contains("visuospatial") {
        "Jigsaw puzzles, drawing, and planning a route before a trip exercise spatial skills."
    } else if domain.contains("attention") {
        "Do one thing at a time, reduce background noise, and take short breaks during demanding tasks."
    } else {
        "Regular, varied mental challenges help maintain this skill."
    }
}

fn highlight_progress(turn: &mut Turn<'_>) {
    let content = turn.context.content.as_ref();
    let profile = &turn.profile;
    let mut reply = String::from("Here's what you've accomplished so far:\n");

    if profile.completed_sessions.is_empty() {
        reply.push_str("\nYou haven't completed a session yet, but you've made a start.");
    }
    for session_id in &profile.completed_sessions {
        let title = content
            .session(*session_id)
            .map_or("", |s| s.title.as_str());
        let _ = write!(reply, "\n✓ Session {session_id}: {title}");
        if let Some(score) = profile.score_for(*session_id) {
            let _ = write!(reply, " (quiz score: {score})");
        }
    }
    if let Some(session_id) = turn.state.conversation.current_session_id {
        let title = content
            .session(session_id)
            .map_or("", |s| s.title.as_str());
        let _ = write!(
            reply,
            "\n\nYou're currently partway through Session {session_id}: {title}."
        );
    }

    turn.say(reply);
    turn.await_response(
        PendingResponse::ResumeSessionChoice,
        Some(strings(&WELCOME_BACK_OPTIONS)),
    );
}

fn resume_session(turn: &mut Turn<'_>) {
    if let Some(session_id) = turn.state.conversation.current_session_id {
        let title = turn
            .context
            .content
            .session(session_id)
            .map_or_else(String::new, |s| s.title.clone());
        turn.say(format!(
            "Let's pick up where you left off in Session {session_id}: {title}."
        ));
    }
    turn.state.exercise = None;
    turn.clear();
    traversal::advance(turn);
}

fn select_session(turn: &mut Turn<'_>, text: &str) {
    let content = turn.context.content.as_ref();
    let known: Vec<_> = content.sessions().iter().map(|s| s.id).collect();
    let Some(session_id) = parse_session_choice(text, &known) else {
        turn.clarify();
        return;
    };
    if content.session(session_id).is_some_and(|s| !s.unlocked) {
        turn.say(format!(
            "Session {session_id} isn't available yet. Please choose an unlocked session."
        ));
        return;
    }
    traversal::start_session(turn, session_id);
}

fn take_quiz(turn: &mut Turn<'_>) {
    match traversal::current_segment(turn) {
        Some(segment) if !segment.quiz.is_empty() => quiz::start(turn, segment.quiz),
        _ => {
            turn.say("There isn't a quiz for this part of the session.");
            traversal::present_branch_menu(turn, traversal::BRANCH_PROMPT);
        }
    }
}

fn discuss_topic(turn: &mut Turn<'_>, topic: Topic) {
    let reply = match topic {
        Topic::AboutMci => "Mild Cognitive Impairment means there are measurable changes in thinking or memory, \
             but they don't stop you from living independently. It sits between the changes of normal aging and dementia.\n\n\
             Causes vary: vascular changes, early Alzheimer's-type changes, sleep problems, mood, medication effects, \
             and other treatable conditions can all play a part. That's why regular follow-up matters, and why many \
             people stay stable or even improve."
            .to_string(),
        Topic::Prevention => "The strongest evidence for slowing decline comes from combining several habits:\n\
             - **Physical exercise**: aim for 150 minutes of moderate activity a week\n\
             - **Cognitive stimulation**: learn new skills rather than repeating familiar ones\n\
             - **Social engagement**: regular, meaningful contact with others\n\
             - **Heart health**: keep blood pressure, cholesterol, and blood sugar in range\n\
             - **Sleep**: 7-8 hours, and get snoring or breathing pauses checked\n\
             - **Diet**: a Mediterranean or MIND style of eating"
            .to_string(),
        Topic::Status => {
            let profile = &turn.profile;
            let mut reply = format!(
                "Your diagnosis is {}. Your ACE-III total was {}.",
                profile.diagnosis_text(),
                profile.ace_total_display()
            );
            let domains = profile.domains_by_strength();
            if let Some((weakest, score)) = domains.first() {
                let _ = write!(
                    reply,
                    " Your lowest relative score was in {weakest} ({score})."
                );
            }
            let strengths: Vec<&str> = domains.iter().rev().take(3).map(|(d, _)| *d).collect();
            if !strengths.is_empty() {
                let _ = write!(reply, " Your strongest areas include {}.", strengths.join(", "));
            }
            reply
        }
        Topic::Goal => "A good personal goal is specific, meaningful to you, and small enough to start this week. \
             For example: \"Walk for 20 minutes after lunch five days a week\" or \"Call a friend every Sunday.\" \
             Think about what matters most to you, then pick one habit that supports it. \
             Write it down and check in on it at your next session."
            .to_string(),
    };
    turn.say(reply);
}

fn strings(options: &[&str]) -> Vec<String> {
    options.iter().map(ToString::to_string).collect()
}
