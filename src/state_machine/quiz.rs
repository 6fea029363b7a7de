//! Quiz sub-engine
//!
//! A quiz runs inside a paused segment discussion. Scoring lives in
//! [`ExerciseState`], which is never persisted: a quiz resumed from a snapshot
//! restarts scoring at the saved question.

use super::intents::parse_option_number;
use super::state::{MessageKind, PendingResponse, Phase};
use super::transition::Turn;
use super::traversal;
use crate::content::QuizQuestion;
use std::time::Duration;

const QUIZ_START_DELAY: Duration = Duration::from_millis(1000);
const QUIZ_RESULT_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAnswer {
    pub question_index: usize,
    pub chosen_index: usize,
    pub correct: bool,
}

/// In-flight quiz progress
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseState {
    pub questions: Vec<QuizQuestion>,
    pub current_question_index: usize,
    pub score: u32,
    pub answers: Vec<QuizAnswer>,
}

impl ExerciseState {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self::resume_at(questions, 0)
    }

    /// Fresh scoring starting at `question_index`
    pub fn resume_at(questions: Vec<QuizQuestion>, question_index: usize) -> Self {
        Self {
            questions,
            current_question_index: question_index,
            score: 0,
            answers: Vec::new(),
        }
    }

    /// Score one answer and move to the next question. Returns whether it was correct.
    pub fn record(&mut self, chosen_index: usize) -> bool {
        let question_index = self.current_question_index;
        let correct = self
            .questions
            .get(question_index)
            .is_some_and(|q| q.correct == chosen_index);
        if correct {
            self.score += 1;
        }
        self.answers.push(QuizAnswer {
            question_index,
            chosen_index,
            correct,
        });
        self.current_question_index += 1;
        correct
    }

    pub fn is_complete(&self) -> bool {
        self.current_question_index >= self.questions.len()
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }
}

/// Begin a quiz over `questions` and ask the first one
pub(crate) fn start(turn: &mut Turn<'_>, questions: Vec<QuizQuestion>) {
    turn.state.conversation.phase = Phase::Quiz;
    turn.say(format!(
        "Let's test your understanding of what we just discussed. Here's a quick {}-question quiz:",
        questions.len()
    ));
    turn.state.exercise = Some(ExerciseState::new(questions.clone()));
    turn.pause(QUIZ_START_DELAY);
    ask(turn, questions, 0);
}

fn ask(turn: &mut Turn<'_>, questions: Vec<QuizQuestion>, question_index: usize) {
    let Some(question) = questions.get(question_index) else {
        complete(turn);
        return;
    };

    let listing = question
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {option}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    turn.say_as(
        MessageKind::Quiz,
        format!(
            "**Question {}:**\n{}\n\n{listing}",
            question_index + 1,
            question.question
        ),
    );

    let options = (1..=question.options.len()).map(|n| n.to_string()).collect();
    turn.await_response(
        PendingResponse::ContentQuiz {
            questions,
            question_index,
        },
        Some(options),
    );
}

/// Score the answer in `text` against the question at `question_index`
pub(crate) fn submit_answer(
    turn: &mut Turn<'_>,
    questions: &[QuizQuestion],
    question_index: usize,
    text: &str,
) {
    let Some(question) = questions.get(question_index) else {
        complete(turn);
        return;
    };
    let Some(chosen) = parse_option_number(text, question.options.len()) else {
        turn.clarify();
        return;
    };

    let exercise = turn.state.exercise.get_or_insert_with(|| {
        tracing::debug!(question_index, "Quiz resumed without scoring state");
        ExerciseState::resume_at(questions.to_vec(), question_index)
    });
    // Realign if the live state drifted from the persisted pending index
    exercise.current_question_index = question_index;
    let correct = exercise.record(chosen);
    let finished = exercise.is_complete();

    let answer = question.options.get(question.correct).map_or("", String::as_str);
    let feedback = if correct {
        format!("✓ Correct! {}", question.explanation)
    } else {
        format!(
            "Not quite. The correct answer is {}. {answer}. {}",
            question.correct + 1,
            question.explanation
        )
    };
    turn.say(feedback.trim_end().to_string());

    if finished {
        complete(turn);
    } else {
        ask(turn, questions.to_vec(), question_index + 1);
    }
}

fn complete(turn: &mut Turn<'_>) {
    let (score, total) = turn
        .state
        .exercise
        .take()
        .map_or((0, 0), |e| (e.score, e.total()));

    let verdict = if usize::try_from(score).is_ok_and(|s| s == total) {
        "Excellent work! You've really grasped the key concepts about MCI."
    } else {
        "Good effort! These are important concepts to understand."
    };
    turn.say(format!(
        "Quiz complete! You got {score} out of {total} correct. {verdict}"
    ));

    if let Some(session_id) = turn.state.conversation.current_session_id {
        turn.profile_mut().record_score(session_id, score);
    }
    turn.state.conversation.phase = Phase::Content;
    turn.clear();

    turn.pause(QUIZ_RESULT_DELAY);
    traversal::present_branch_menu(turn, traversal::AFTER_QUIZ_PROMPT);
}
