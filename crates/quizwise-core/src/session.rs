//! Quiz settings and the per-client quiz session state machine.
//!
//! A client without a session is awaiting settings. [`QuizSession::start`]
//! puts it in progress; it completes either through [`QuizSession::finish`]
//! once every position is answered, or through the lazy deadline check in
//! exam mode. All time-dependent methods take `now` explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuizError;

/// Questions shown per page once a quiz is longer than this.
pub const MAX_QUESTIONS_PER_PAGE: usize = 10;

/// Quiz variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    /// Timed when a duration is set; no feedback until completion.
    Exam,
    Practice,
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizMode::Exam => write!(f, "exam"),
            QuizMode::Practice => write!(f, "practice"),
        }
    }
}

impl FromStr for QuizMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exam" => Ok(QuizMode::Exam),
            "practice" => Ok(QuizMode::Practice),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// When per-question results are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsPolicy {
    Immediate,
    End,
}

impl fmt::Display for ResultsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultsPolicy::Immediate => write!(f, "immediate"),
            ResultsPolicy::End => write!(f, "end"),
        }
    }
}

impl FromStr for ResultsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "immediate" => Ok(ResultsPolicy::Immediate),
            "end" => Ok(ResultsPolicy::End),
            other => Err(format!("unknown results policy: {other}")),
        }
    }
}

/// Raw settings payload as sent by a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRequest {
    /// 0 means untimed.
    #[serde(default)]
    pub duration_minutes: u32,
    pub total_questions: u32,
    pub mode: String,
    #[serde(default = "default_show_results")]
    pub show_results: String,
    #[serde(default)]
    pub reveal_correct_answers: bool,
}

fn default_show_results() -> String {
    "immediate".to_string()
}

/// Validated, immutable settings of one quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub duration_minutes: u32,
    pub total_questions: usize,
    pub questions_per_page: usize,
    pub mode: QuizMode,
    pub show_results: ResultsPolicy,
    pub reveal_correct_answers: bool,
}

impl QuizSettings {
    /// Validate a request and clamp the question count to `pool_size`.
    pub fn resolve(request: &SettingsRequest, pool_size: usize) -> Result<Self, QuizError> {
        if request.total_questions == 0 {
            return Err(QuizError::InvalidSettings(
                "total questions must be at least 1".into(),
            ));
        }
        let mode: QuizMode = request.mode.parse().map_err(QuizError::InvalidSettings)?;
        let show_results: ResultsPolicy = request
            .show_results
            .parse()
            .map_err(QuizError::InvalidSettings)?;
        if pool_size == 0 {
            return Err(QuizError::EmptyBank);
        }

        let total_questions = (request.total_questions as usize).min(pool_size);
        Ok(Self {
            duration_minutes: request.duration_minutes,
            total_questions,
            questions_per_page: questions_per_page(total_questions),
            mode,
            show_results,
            reveal_correct_answers: request.reveal_correct_answers,
        })
    }

    /// Whether this quiz runs against a wall-clock deadline.
    pub fn is_timed(&self) -> bool {
        self.mode == QuizMode::Exam && self.duration_minutes > 0
    }

    /// Whether answered questions show correctness while the quiz runs.
    pub fn gives_immediate_feedback(&self) -> bool {
        self.mode == QuizMode::Practice && self.show_results == ResultsPolicy::Immediate
    }
}

/// Page size for a quiz of `total` questions.
pub fn questions_per_page(total: usize) -> usize {
    if total <= MAX_QUESTIONS_PER_PAGE {
        total.max(1)
    } else {
        MAX_QUESTIONS_PER_PAGE
    }
}

/// Lifecycle state of an existing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Paging intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Prev,
    /// 1-based page number.
    Page(usize),
    /// 1-based absolute question position.
    Question(usize),
}

/// Result of a finish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishAttempt {
    Completed,
    /// Nothing changed; these positions still need an answer.
    Incomplete { unanswered: Vec<usize> },
}

/// Server-held state of one client's quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: Uuid,
    pub settings: QuizSettings,
    /// Chosen once at start; never reordered.
    pub question_sequence: Vec<String>,
    /// 1-based.
    pub current_page: usize,
    /// 1-based position → chosen choice text.
    #[serde(default)]
    pub answers: BTreeMap<usize, String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Completed by the deadline rather than by `finish`.
    #[serde(default)]
    pub timed_out: bool,
    /// Set once the outcomes were fed into the statistics store.
    #[serde(default)]
    pub stats_recorded: bool,
}

impl QuizSession {
    /// Begin a quiz over an already selected question sequence.
    pub fn start(
        settings: QuizSettings,
        question_sequence: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let (started_at, deadline_at) = if settings.is_timed() {
            (
                Some(now),
                Some(now + Duration::minutes(i64::from(settings.duration_minutes))),
            )
        } else {
            (None, None)
        };
        let mut settings = settings;
        // The selector may return fewer ids than requested.
        settings.total_questions = question_sequence.len();
        settings.questions_per_page = questions_per_page(settings.total_questions);

        Self {
            id: Uuid::new_v4(),
            settings,
            question_sequence,
            current_page: 1,
            answers: BTreeMap::new(),
            started_at,
            deadline_at,
            status: SessionStatus::InProgress,
            completed_at: None,
            timed_out: false,
            stats_recorded: false,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.question_sequence.len()
    }

    pub fn total_pages(&self) -> usize {
        self.total_questions()
            .div_ceil(self.settings.questions_per_page)
            .max(1)
    }

    /// Page containing absolute position `position`.
    pub fn page_of(&self, position: usize) -> usize {
        position.saturating_sub(1) / self.settings.questions_per_page + 1
    }

    /// Absolute positions shown on `page`.
    pub fn positions_on_page(&self, page: usize) -> std::ops::RangeInclusive<usize> {
        let per_page = self.settings.questions_per_page;
        let first = (page - 1) * per_page + 1;
        let last = (page * per_page).min(self.total_questions());
        first..=last
    }

    /// Question id at 1-based `position`.
    pub fn question_at(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.question_sequence.get(i))
            .map(String::as_str)
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    pub fn unanswered_positions(&self) -> Vec<usize> {
        (1..=self.total_questions())
            .filter(|p| !self.answers.contains_key(p))
            .collect()
    }

    /// Merge answers for a page. Existing answers are only ever overwritten.
    ///
    /// Every position is validated before anything is merged.
    pub fn submit_answers(
        &mut self,
        page_answers: impl IntoIterator<Item = (usize, String)>,
    ) -> Result<usize, QuizError> {
        self.ensure_in_progress()?;
        let page_answers: Vec<(usize, String)> = page_answers.into_iter().collect();
        let total = self.total_questions();
        if let Some(&(position, _)) = page_answers
            .iter()
            .find(|(p, _)| *p == 0 || *p > total)
        {
            return Err(QuizError::PositionOutOfRange { position, total });
        }
        let count = page_answers.len();
        self.answers.extend(page_answers);
        Ok(count)
    }

    /// Move the paging cursor. Returns the new page.
    pub fn navigate(&mut self, target: Navigation) -> Result<usize, QuizError> {
        self.ensure_in_progress()?;
        let total_pages = self.total_pages();
        let page = match target {
            Navigation::Next => self.current_page + 1,
            Navigation::Prev => self.current_page.saturating_sub(1),
            Navigation::Page(p) => p,
            Navigation::Question(q) => {
                let total = self.total_questions();
                if q == 0 || q > total {
                    return Err(QuizError::PositionOutOfRange { position: q, total });
                }
                self.page_of(q)
            }
        };
        if page == 0 || page > total_pages {
            return Err(QuizError::PageOutOfRange { page, total_pages });
        }
        self.current_page = page;
        Ok(page)
    }

    /// Complete the quiz if every position has an answer.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<FinishAttempt, QuizError> {
        self.ensure_in_progress()?;
        let unanswered = self.unanswered_positions();
        if !unanswered.is_empty() {
            return Ok(FinishAttempt::Incomplete { unanswered });
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        Ok(FinishAttempt::Completed)
    }

    /// Force-complete an exam whose deadline has passed.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn check_deadline(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_in_progress() || self.settings.mode != QuizMode::Exam {
            return false;
        }
        match self.deadline_at {
            Some(deadline) if now >= deadline => {
                self.status = SessionStatus::Completed;
                self.completed_at = Some(deadline);
                self.timed_out = true;
                true
            }
            _ => false,
        }
    }

    /// Time left before the deadline, clamped at zero.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline_at
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    /// Time spent, for timed exams that have started.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.settings.mode != QuizMode::Exam {
            return None;
        }
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some((end - started).max(Duration::zero()))
    }

    fn ensure_in_progress(&self) -> Result<(), QuizError> {
        if self.is_in_progress() {
            Ok(())
        } else {
            Err(QuizError::NotInProgress(self.status))
        }
    }
}

/// Render a duration as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
