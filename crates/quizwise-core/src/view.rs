//! Read-only projections handed to front ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::session::{format_duration, QuizMode, QuizSession};

/// One question as shown on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub position: usize,
    pub id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub answered: bool,
    pub selected: Option<String>,
    /// Only set with immediate feedback and an answer.
    pub correct: Option<bool>,
    /// Only set when correct answers are revealed.
    pub correct_choice: Option<String>,
}

/// Answers graded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningScore {
    pub correct: usize,
    pub incorrect: usize,
}

/// The current page of an in-progress quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    pub page: usize,
    pub total_pages: usize,
    pub questions_per_page: usize,
    pub questions: Vec<QuestionView>,
    pub answered_count: usize,
    pub total_questions: usize,
    pub mode: QuizMode,
    /// `MM:SS` left before the deadline, for timed exams.
    pub time_remaining: Option<String>,
    pub running_score: Option<RunningScore>,
}

impl PageView {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn all_answered(&self) -> bool {
        self.answered_count == self.total_questions
    }
}

/// Project the current page of `session`. Ids missing from the bank are
/// left off the page.
pub fn page_view(session: &QuizSession, bank: &QuestionBank, now: DateTime<Utc>) -> PageView {
    let settings = &session.settings;
    let feedback = settings.gives_immediate_feedback();

    let questions = session
        .positions_on_page(session.current_page)
        .filter_map(|position| {
            let id = session.question_at(position)?;
            let Some(question) = bank.get(id) else {
                tracing::warn!("question {id} at position {position} is no longer in the bank");
                return None;
            };
            let selected = session.answers.get(&position).cloned();
            let correct = match (&selected, feedback) {
                (Some(answer), true) => Some(question.is_correct(answer)),
                _ => None,
            };
            let correct_choice = (feedback && settings.reveal_correct_answers && selected.is_some())
                .then(|| question.correct_choice.clone());
            Some(QuestionView {
                position,
                id: id.to_string(),
                prompt: question.prompt.clone(),
                choices: question.choices.clone(),
                answered: selected.is_some(),
                selected,
                correct,
                correct_choice,
            })
        })
        .collect();

    PageView {
        page: session.current_page,
        total_pages: session.total_pages(),
        questions_per_page: settings.questions_per_page,
        questions,
        answered_count: session.answers.len(),
        total_questions: session.total_questions(),
        mode: settings.mode,
        time_remaining: session.time_remaining(now).map(format_duration),
        running_score: feedback.then(|| running_score(session, bank)),
    }
}

/// Tally answered questions that still exist in the bank.
pub fn running_score(session: &QuizSession, bank: &QuestionBank) -> RunningScore {
    let mut score = RunningScore::default();
    for (&position, answer) in &session.answers {
        let Some(question) = session.question_at(position).and_then(|id| bank.get(id)) else {
            continue;
        };
        if question.is_correct(answer) {
            score.correct += 1;
        } else {
            score.incorrect += 1;
        }
    }
    score
}
