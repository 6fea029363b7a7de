//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::content::{ContentTree, Module, QuizQuestion, Segment, Session, StaticContent};
use crate::profile::UserProfile;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ChatContext {
    ChatContext::new(
        "test-user",
        UserProfile::default_diagnostic(),
        Arc::new(StaticContent::builtin()),
    )
}

/// One-session catalog whose only segment offers the given quiz
fn quiz_context(questions: Vec<QuizQuestion>) -> ChatContext {
    let content = StaticContent::new(vec![Session {
        id: 1,
        title: "Quiz session".to_string(),
        unlocked: true,
    }])
    .with_content(
        1,
        ContentTree {
            title: "Quiz session".to_string(),
            modules: vec![Module::segmented(
                "Only module",
                vec![Segment::new("Read this first.")
                    .with_discussion(
                        "Ready for a quiz?",
                        vec!["Yes, test my knowledge".to_string()],
                    )
                    .with_quiz(questions)],
            )],
        },
    );
    ChatContext::new("test-user", UserProfile::default(), Arc::new(content))
}

fn step(state: &ChatState, ctx: &ChatContext, text: &str) -> TransitionResult {
    transition(state, ctx, Event::user_response(text)).expect("non-empty input")
}

fn opened(ctx: &ChatContext) -> ChatState {
    transition(&ChatState::new(), ctx, Event::Open)
        .expect("open never fails")
        .new_state
}

fn is_valid_state(state: &ChatState) -> bool {
    let conv = &state.conversation;
    let cursor_reset = conv.current_session_id.is_some()
        || (conv.current_module_index == 0 && conv.current_segment_index == 0);
    let quiz_consistent = !matches!(conv.pending_response, Some(PendingResponse::ContentQuiz { .. }))
        || conv.phase == Phase::Quiz;
    let ids_increase = conv.recent_messages.windows(2).all(|w| w[0].id < w[1].id);
    let ids_below_next = conv
        .recent_messages
        .iter()
        .all(|m| m.id < state.next_message_id);

    cursor_reset
        && quiz_consistent
        && ids_increase
        && ids_below_next
        && conv.recent_messages.len() <= RECENT_MESSAGE_LIMIT
}

fn effects_are_valid(effects: &[Effect], state: &ChatState) -> bool {
    let persists = effects.iter().filter(|e| **e == Effect::PersistState).count() == 1;
    let options_last = matches!(
        effects.last(),
        Some(Effect::NotifyOptions { options }) if *options == state.conversation.answer_options
    );
    persists && options_last
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// What the user does on a turn
#[derive(Debug, Clone)]
enum Action {
    Open,
    /// Click the nth offered option (wrapping)
    Choose(usize),
    Type(String),
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        1 => Just(Action::Open),
        6 => (0usize..8).prop_map(Action::Choose),
        3 => "[a-zA-Z0-9 ]{0,19}[a-zA-Z0-9]".prop_map(Action::Type),
    ]
}

fn to_event(state: &ChatState, action: Action) -> Event {
    match action {
        Action::Open => Event::Open,
        Action::Choose(n) => match &state.conversation.answer_options {
            Some(options) if !options.is_empty() => {
                Event::user_response(options[n % options.len()].clone())
            }
            _ => Event::user_response("Continue"),
        },
        Action::Type(text) => Event::user_response(text),
    }
}

fn arb_quiz_question() -> impl Strategy<Value = QuizQuestion> {
    (2usize..6).prop_flat_map(|count| {
        (
            "[a-z ]{5,30}",
            proptest::collection::vec("[a-z]{1,10}", count),
            0..count,
        )
            .prop_map(|(question, options, correct)| QuizQuestion {
                question,
                options,
                correct,
                explanation: String::new(),
            })
    })
}

/// Casing variations of a phrase
fn arb_casing(phrase: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(any::<bool>(), phrase.len()).prop_map(move |upper| {
        phrase
            .chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect()
    })
}

/// States awaiting a response whose rules have no catch-all
fn arb_strict_pending_state() -> impl Strategy<Value = ChatState> {
    prop_oneof![
        Just(PendingResponse::Welcome),
        Just(PendingResponse::PostSummaryChoice),
        Just(PendingResponse::ResumeSessionChoice),
        Just(PendingResponse::SessionSelect),
        Just(PendingResponse::SegmentDiscussion),
    ]
    .prop_map(|pending| {
        let in_session = pending == PendingResponse::SegmentDiscussion;
        let mut state = opened(&test_context());
        if in_session {
            state.conversation.enter_session(1);
        }
        state.conversation.pending_response = Some(pending);
        state.conversation.answer_options = Some(vec!["A".to_string()]);
        state
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Invariant 1: Valid state after any transition
    #[test]
    fn prop_transitions_preserve_validity(actions in proptest::collection::vec(arb_action(), 0..30)) {
        let ctx = test_context();
        let mut state = ChatState::new();

        for action in actions {
            let event = to_event(&state, action);
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    state = result.new_state;
                    prop_assert!(is_valid_state(&state), "Invalid state: {:?}", state);
                    prop_assert!(
                        effects_are_valid(&result.effects, &state),
                        "Invalid effects for state {:?}: {:?}",
                        state,
                        result.effects
                    );
                }
                Err(e) => prop_assert!(false, "Non-empty input rejected: {e}"),
            }
        }
    }

    // Invariant 2: Without a pending response only guidance is given
    #[test]
    fn prop_no_pending_gives_guidance_only(text in "[a-zA-Z0-9 ]{0,20}[a-zA-Z0-9]") {
        let ctx = test_context();
        let mut state = opened(&ctx);
        state.conversation.pending_response = None;
        state.conversation.answer_options = None;

        let result = step(&state, &ctx, &text);
        let texts: Vec<_> = result.messages().map(|m| m.text.clone()).collect();
        prop_assert_eq!(texts.len(), 1);
        prop_assert!(texts[0].starts_with("You can start by choosing"));
        prop_assert_eq!(result.new_state.pending(), None);
        prop_assert_eq!(result.new_state.conversation.phase, state.conversation.phase);
        prop_assert_eq!(result.new_state.conversation.current_session_id, None);
        prop_assert!(result.profile.is_none());
    }

    // Invariant 3: Welcome matching ignores casing and surrounding words
    #[test]
    fn prop_welcome_guide_matching(
        phrase in arb_casing("Start My Brain Health Guide"),
        prefix in "[a-z]{0,8} ?",
        suffix in " ?[a-z]{0,8}",
    ) {
        let ctx = test_context();
        let result = step(&opened(&ctx), &ctx, &format!("{prefix}{phrase}{suffix}"));
        prop_assert_eq!(result.new_state.pending(), Some(&PendingResponse::SessionSelect));
    }

    #[test]
    fn prop_welcome_diagnosis_matching(
        phrase in arb_casing("Understand My Diagnosis"),
        suffix in " please| now|",
    ) {
        let ctx = test_context();
        let result = step(&opened(&ctx), &ctx, &format!("{phrase}{suffix}"));
        prop_assert_eq!(result.new_state.pending(), Some(&PendingResponse::DiagnosisChoice));
    }

    // Invariant 4: Answering every question correctly scores N out of N
    #[test]
    fn prop_all_correct_quiz(questions in proptest::collection::vec(arb_quiz_question(), 1..6)) {
        let total = questions.len();
        let ctx = quiz_context(questions);
        let state = step(&opened(&ctx), &ctx, "Start My Brain Health Guide").new_state;
        let state = step(&state, &ctx, "Session 1").new_state;
        let mut result = step(&state, &ctx, "Yes, test my knowledge");

        while let Some(PendingResponse::ContentQuiz { questions, question_index }) =
            result.new_state.pending().cloned()
        {
            let answer = (questions[question_index].correct + 1).to_string();
            result = step(&result.new_state, &ctx, &answer);
        }

        let expected = format!("Quiz complete! You got {total} out of {total} correct. Excellent work!");
        prop_assert!(result.messages().any(|m| m.text.starts_with(&expected)));
        let recorded = result.profile.as_ref().and_then(|p| p.score_for(1));
        prop_assert_eq!(recorded, u32::try_from(total).ok());
        prop_assert_eq!(result.new_state.conversation.phase, Phase::Content);
    }

    // Invariant 5: Completing a session is idempotent
    #[test]
    fn prop_completion_idempotent(already in proptest::collection::btree_set(1u32..8, 0..7)) {
        let mut ctx = test_context();
        ctx.profile.completed_sessions = already.clone();

        let state = step(&opened(&ctx), &ctx, "Start My Brain Health Guide").new_state;
        // Session 3 has no content, so starting it completes it
        let result = step(&state, &ctx, "Session 3");
        let completed = result.profile.expect("completion updates the profile").completed_sessions;
        let mut expected = already;
        expected.insert(3);
        prop_assert_eq!(completed, expected);
        prop_assert_eq!(result.new_state.conversation.current_session_id, None);
    }

    // Invariant 6: Unrecognized input leaves the pending response untouched
    #[test]
    fn prop_gibberish_keeps_pending(state in arb_strict_pending_state(), text in "[xzq]{1,20}") {
        let ctx = test_context();
        let result = step(&state, &ctx, &text);
        prop_assert_eq!(result.new_state.pending(), state.pending());
        prop_assert_eq!(
            &result.new_state.conversation.answer_options,
            &state.conversation.answer_options
        );
        prop_assert_eq!(
            result.messages().last().map(|m| m.text.as_str()),
            Some("I didn't quite understand that. Could you please rephrase?")
        );
    }
}
