//! Grading a completed quiz.
//!
//! [`score`] is pure: it never touches the statistics store. The graded
//! answers it returns are recorded by the engine, once per completion.

use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::session::{QuizSession, ResultsPolicy};
use crate::statistics::GradedAnswer;

/// Outcome of a single position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    /// 1-based position in the quiz.
    pub position: usize,
    pub question_id: String,
    pub prompt: String,
    /// `None` when the position was never answered.
    pub selected: Option<String>,
    pub correct_choice: String,
    pub is_correct: bool,
}

/// Final report of a completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizReport {
    pub correct_count: usize,
    pub incorrect_count: usize,
    /// Positions left blank (only possible after a timeout).
    pub unanswered_count: usize,
    /// Rounded percentage of answered questions that were correct.
    pub score: u32,
    /// Exam time spent in seconds.
    #[serde(default)]
    pub elapsed_secs: Option<i64>,
    #[serde(default)]
    pub timed_out: bool,
    /// Per-position results, when the settings allow showing them.
    #[serde(default)]
    pub details: Option<Vec<QuestionOutcome>>,
}

/// A report together with the answers to feed into statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSheet {
    pub report: QuizReport,
    pub graded: Vec<GradedAnswer>,
}

/// `round(100 * correct / (correct + incorrect))`, or 0 with nothing answered.
pub fn percentage(correct: usize, incorrect: usize) -> u32 {
    let answered = correct + incorrect;
    if answered == 0 {
        return 0;
    }
    (100.0 * correct as f64 / answered as f64).round() as u32
}

/// Grade `session` against `bank`.
///
/// Ids that are no longer in the bank are skipped entirely: they count
/// toward nothing and are left out of the details.
pub fn score(session: &QuizSession, bank: &QuestionBank) -> ScoreSheet {
    let mut outcomes = Vec::with_capacity(session.total_questions());
    let mut graded = Vec::new();
    let mut correct_count = 0;
    let mut incorrect_count = 0;
    let mut unanswered_count = 0;

    for (index, id) in session.question_sequence.iter().enumerate() {
        let position = index + 1;
        let Some(question) = bank.get(id) else {
            tracing::warn!("question {id} at position {position} is no longer in the bank");
            continue;
        };

        let selected = session.answers.get(&position).cloned();
        let is_correct = match &selected {
            Some(answer) => {
                let ok = question.is_correct(answer);
                if ok {
                    correct_count += 1;
                } else {
                    incorrect_count += 1;
                }
                graded.push(GradedAnswer {
                    question_id: id.clone(),
                    correct: ok,
                });
                ok
            }
            None => {
                unanswered_count += 1;
                false
            }
        };

        outcomes.push(QuestionOutcome {
            position,
            question_id: id.clone(),
            prompt: question.prompt.clone(),
            selected,
            correct_choice: question.correct_choice.clone(),
            is_correct,
        });
    }

    let settings = &session.settings;
    let show_details =
        settings.show_results == ResultsPolicy::End || settings.reveal_correct_answers;

    let report = QuizReport {
        correct_count,
        incorrect_count,
        unanswered_count,
        score: percentage(correct_count, incorrect_count),
        elapsed_secs: session
            .completed_at
            .and_then(|end| session.elapsed(end))
            .map(|d| d.num_seconds()),
        timed_out: session.timed_out,
        details: show_details.then_some(outcomes),
    };

    ScoreSheet { report, graded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Question;
    use crate::session::{QuizSettings, SettingsRequest};
    use chrono::{Duration, TimeZone, Utc};

    fn bank(ids: &[&str]) -> QuestionBank {
        QuestionBank::new(ids.iter().map(|id| Question {
            id: id.to_string(),
            prompt: format!("Prompt {id}"),
            choices: vec!["right".into(), "wrong".into()],
            correct_choice: "right".into(),
        }))
    }

    fn completed(
        ids: &[&str],
        answers: &[(usize, &str)],
        mode: &str,
        policy: &str,
    ) -> QuizSession {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let settings = QuizSettings::resolve(
            &SettingsRequest {
                duration_minutes: 20,
                total_questions: ids.len() as u32,
                mode: mode.into(),
                show_results: policy.into(),
                reveal_correct_answers: false,
            },
            ids.len(),
        )
        .unwrap();
        let mut session =
            QuizSession::start(settings, ids.iter().map(|s| s.to_string()).collect(), start);
        session
            .submit_answers(answers.iter().map(|(p, a)| (*p, a.to_string())))
            .unwrap();
        if !session.check_deadline(start + Duration::minutes(30)) {
            session.finish(start + Duration::minutes(5)).unwrap();
        }
        session
    }

    #[test]
    fn percentage_rounding() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(4, 1), 80);
        assert_eq!(percentage(2, 1), 67);
        assert_eq!(percentage(1, 2), 33);
        assert_eq!(percentage(1, 7), 13);
    }

    #[test]
    fn scores_answers_and_collects_graded() {
        let session = completed(
            &["a", "b", "c", "d", "e"],
            &[(1, "right"), (2, "right"), (3, "wrong"), (4, "right"), (5, "right")],
            "practice",
            "end",
        );
        let sheet = score(&session, &bank(&["a", "b", "c", "d", "e"]));
        assert_eq!(sheet.report.correct_count, 4);
        assert_eq!(sheet.report.incorrect_count, 1);
        assert_eq!(sheet.report.score, 80);
        assert_eq!(sheet.graded.len(), 5);
        assert!(!sheet.graded[2].correct);
        assert!(sheet.report.elapsed_secs.is_none());
        let details = sheet.report.details.unwrap();
        assert_eq!(details.len(), 5);
        assert_eq!(details[2].selected.as_deref(), Some("wrong"));
    }

    #[test]
    fn missing_questions_are_skipped() {
        let session = completed(
            &["a", "gone", "c"],
            &[(1, "right"), (2, "wrong"), (3, "wrong")],
            "practice",
            "end",
        );
        let sheet = score(&session, &bank(&["a", "c"]));
        assert_eq!(sheet.report.correct_count, 1);
        assert_eq!(sheet.report.incorrect_count, 1);
        assert_eq!(sheet.report.score, 50);
        assert_eq!(sheet.graded.len(), 2);
        let details = sheet.report.details.unwrap();
        assert!(details.iter().all(|d| d.question_id != "gone"));
        assert_eq!(details[1].position, 3);
    }

    #[test]
    fn details_hidden_for_immediate_without_reveal() {
        let session = completed(&["a"], &[(1, "right")], "practice", "immediate");
        let sheet = score(&session, &bank(&["a"]));
        assert!(sheet.report.details.is_none());
        assert_eq!(sheet.report.score, 100);
    }

    #[test]
    fn timed_out_exam_with_no_answers_scores_zero() {
        let session = completed(&["a", "b"], &[], "exam", "end");
        let sheet = score(&session, &bank(&["a", "b"]));
        assert!(sheet.report.timed_out);
        assert_eq!(sheet.report.score, 0);
        assert_eq!(sheet.report.unanswered_count, 2);
        assert_eq!(sheet.report.elapsed_secs, Some(20 * 60));
        assert!(sheet.graded.is_empty());
    }

    #[test]
    fn scoring_is_repeatable() {
        let session = completed(&["a", "b"], &[(1, "right"), (2, "wrong")], "exam", "end");
        let b = bank(&["a", "b"]);
        assert_eq!(score(&session, &b), score(&session, &b));
    }
}
