//! Content traversal: session -> module -> segment
//!
//! The cursor lives in `ConversationState`. [`advance`] walks forward from it
//! until a segment asks for discussion or the session runs out of modules.

use super::state::{MenuEntry, Message, MessageKind, PendingResponse, Phase};
use super::transition::Turn;
use crate::content::{ContentRepository, Segment};
use crate::profile::SessionId;
use serde_json::json;
use std::time::Duration;

const MENU_DELAY: Duration = Duration::from_millis(500);
const SESSION_START_DELAY: Duration = Duration::from_millis(1000);
const DISCUSSION_DELAY: Duration = Duration::from_millis(2500);
const FLAT_MODULE_DELAY: Duration = Duration::from_millis(3000);
const COMPLETION_MENU_DELAY: Duration = Duration::from_millis(2000);

pub(crate) const BRANCH_PROMPT: &str = "Would you like to learn more about MCI itself, explore prevention strategies in detail, understand your specific MCI status better, define a personal goal that will work for you? Or shall we move on to the next learning session?";
pub(crate) const AFTER_QUIZ_PROMPT: &str = "Now, would you like to learn more about MCI itself, explore prevention strategies in detail, understand your specific MCI status better, define a personal goal that will work for you? Or shall we move on to the next learning session?";

pub const BRANCH_OPTIONS: [&str; 5] = [
    "Learn more about MCI",
    "Explore prevention strategies",
    "Understand my MCI status",
    "Define a personal goal",
    "Move to next learning session",
];

/// Show the session catalog and wait for a pick
pub(crate) fn show_session_menu(turn: &mut Turn<'_>) {
    turn.state.conversation.leave_session();
    turn.say("Here are the available training sessions. Each session takes about 10 minutes. Click on a session to begin:");

    let entries: Vec<MenuEntry> = turn
        .context
        .content
        .sessions()
        .iter()
        .map(|session| MenuEntry {
            session_id: session.id,
            title: session.title.clone(),
            unlocked: session.unlocked,
            completed: turn.profile.is_session_complete(session.id),
        })
        .collect();

    let listing = entries
        .iter()
        .map(|entry| {
            let marker = if entry.completed { " ✓" } else { "" };
            format!("Session {}: {}{marker}", entry.session_id, entry.title)
        })
        .collect::<Vec<_>>()
        .join("\n");
    let options = entries
        .iter()
        .map(|entry| format!("Session {}: {}", entry.session_id, entry.title))
        .collect();

    turn.pause(MENU_DELAY);
    let mut menu = Message::bot(turn.next_message_id(), MessageKind::SessionMenu, listing);
    menu.menu = entries;
    turn.emit(menu);

    turn.await_response(PendingResponse::SessionSelect, Some(options));
}

/// Enter a session and show its content
pub(crate) fn start_session(turn: &mut Turn<'_>, session_id: SessionId) {
    let title = session_title(turn.context.content.as_ref(), session_id);
    tracing::info!(user_id = %turn.context.user_id, session_id, "Starting session");

    turn.state.conversation.enter_session(session_id);
    turn.clear();
    turn.say(format!("Great! Let's begin Session {session_id}: {title}."));
    turn.pause(SESSION_START_DELAY);
    advance(turn);
}

/// Step over the segment the user was discussing and keep going
pub(crate) fn advance_past_segment(turn: &mut Turn<'_>) {
    let conversation = &mut turn.state.conversation;
    conversation.current_segment_index += 1;
    conversation.phase = Phase::Content;
    turn.clear();
    advance(turn);
}

/// Walk the cursor forward, emitting content until a discussion pause or
/// the end of the session
pub(crate) fn advance(turn: &mut Turn<'_>) {
    let Some(session_id) = turn.state.conversation.current_session_id else {
        show_session_menu(turn);
        return;
    };
    let tree = turn.context.content.resolve(session_id, &turn.profile);
    let modules = tree.as_ref().map_or(&[][..], |t| t.modules.as_slice());
    turn.state.conversation.phase = Phase::Content;

    loop {
        let module_index = turn.state.conversation.current_module_index;
        let Some(module) = modules.get(module_index) else {
            let title = tree
                .as_ref()
                .map(|t| t.title.clone())
                .unwrap_or_else(|| session_title(turn.context.content.as_ref(), session_id));
            complete_session(turn, session_id, &title);
            return;
        };

        let Some(segments) = module.segments() else {
            turn.say(format!("**{}**\n\n{}", module.title, module.flat_text()));
            let conversation = &mut turn.state.conversation;
            conversation.current_module_index += 1;
            conversation.current_segment_index = 0;
            turn.pause(FLAT_MODULE_DELAY);
            continue;
        };

        let segment_index = turn.state.conversation.current_segment_index;
        let Some(segment) = segments.get(segment_index) else {
            let conversation = &mut turn.state.conversation;
            conversation.current_segment_index = 0;
            conversation.current_module_index += 1;
            continue;
        };

        turn.say(segment.content.clone());
        if let Some(prompt) = segment.discussion_prompt() {
            turn.pause(DISCUSSION_DELAY);
            turn.say(prompt);
            turn.await_response(PendingResponse::SegmentDiscussion, Some(segment.options()));
            return;
        }
        turn.state.conversation.current_segment_index += 1;
    }
}

/// Mark the session done, celebrate, and return to the menu
pub(crate) fn complete_session(turn: &mut Turn<'_>, session_id: SessionId, title: &str) {
    let newly_completed = turn.profile_mut().mark_session_complete(session_id);
    tracing::info!(
        user_id = %turn.context.user_id,
        session_id,
        newly_completed,
        "Session complete"
    );

    let data = json!({
        "title": title,
        "score": turn.profile.score_for(session_id),
    });
    turn.push_effect(super::Effect::PersistProfile);
    turn.push_effect(super::Effect::RecordSession { session_id, data });

    turn.say_as(
        MessageKind::Celebration,
        format!("🎉 Congratulations! You've completed Session {session_id}: {title}!"),
    );
    turn.state.conversation.leave_session();

    turn.pause(COMPLETION_MENU_DELAY);
    show_session_menu(turn);
}

/// Re-offer the discussion branches for the paused segment
pub(crate) fn present_branch_menu(turn: &mut Turn<'_>, prompt: &str) {
    turn.say(prompt);
    turn.await_response(
        PendingResponse::SegmentDiscussion,
        Some(BRANCH_OPTIONS.iter().map(ToString::to_string).collect()),
    );
}

/// The segment under the cursor, if the cursor points at one
pub(crate) fn current_segment(turn: &Turn<'_>) -> Option<Segment> {
    let conversation = &turn.state.conversation;
    let session_id = conversation.current_session_id?;
    let tree = turn.context.content.resolve(session_id, &turn.profile)?;
    tree.modules
        .get(conversation.current_module_index)?
        .segments()?
        .get(conversation.current_segment_index)
        .cloned()
}

fn session_title(content: &dyn ContentRepository, session_id: SessionId) -> String {
    content
        .session(session_id)
        .map_or_else(|| format!("Session {session_id}"), |s| s.title.clone())
}
