//! Central quiz orchestrator.
//!
//! Wires the question bank, statistics store, selector, session store and
//! scorer together. Every request loads the client's session, applies the
//! lazy deadline check, performs its transition, and persists the session
//! before returning. Requests for one client are serialized, so a
//! completion is graded and recorded exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::error::{QuizError, StorageError};
use crate::scorer::{self, QuizReport};
use crate::selector::select_questions;
use crate::session::{
    FinishAttempt, Navigation, QuizSession, QuizSettings, SessionStatus, SettingsRequest,
};
use crate::sessions::SessionStore;
use crate::statistics::StatisticsStore;
use crate::view::{page_view, PageView};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What a client currently sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizView {
    AwaitingSettings,
    InProgress(PageView),
    Completed(QuizReport),
}

/// Result of asking to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    Completed(QuizReport),
    /// Unanswered questions remain; the page is unchanged.
    Incomplete {
        unanswered: Vec<usize>,
        page: PageView,
    },
}

/// The quiz engine.
pub struct QuizEngine {
    bank: Arc<QuestionBank>,
    stats: Arc<StatisticsStore>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    client_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QuizEngine {
    pub fn new(
        bank: Arc<QuestionBank>,
        stats: Arc<StatisticsStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            bank,
            stats,
            sessions,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_entropy()),
            client_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the random source, e.g. with a seeded generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn stats(&self) -> &StatisticsStore {
        &self.stats
    }

    /// Start a new quiz, replacing a completed one for this client.
    ///
    /// An expired exam is graded first so its answers reach the statistics
    /// store. A quiz still in progress is left alone and
    /// [`QuizError::AlreadyInProgress`] is returned.
    pub fn start(
        &self,
        client_id: &str,
        request: &SettingsRequest,
    ) -> Result<PageView, QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        let settings = QuizSettings::resolve(request, self.bank.len())?;
        if let Some((previous, _)) = self.load(client_id)? {
            if previous.is_in_progress() {
                return Err(QuizError::AlreadyInProgress);
            }
        }

        let snapshot = self.stats.snapshot()?;
        let sequence = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| StorageError::Poisoned("rng"))?;
            select_questions(
                &self.bank.ids(),
                &snapshot,
                settings.total_questions,
                &mut *rng,
            )
        };

        let now = self.clock.now();
        let session = QuizSession::start(settings, sequence, now);
        self.sessions.save(client_id, &session)?;
        tracing::info!(
            "client {client_id} started {} quiz {} with {} questions",
            session.settings.mode,
            session.id,
            session.total_questions()
        );
        Ok(page_view(&session, &self.bank, now))
    }

    /// Current state for `client_id`.
    pub fn view(&self, client_id: &str) -> Result<QuizView, QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        let Some((session, _)) = self.load(client_id)? else {
            return Ok(QuizView::AwaitingSettings);
        };
        self.view_of(&session)
    }

    /// Merge answers for the current page.
    pub fn submit(
        &self,
        client_id: &str,
        answers: impl IntoIterator<Item = (usize, String)>,
    ) -> Result<QuizView, QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        let (mut session, _) = self.require(client_id)?;
        let count = session.submit_answers(answers)?;
        self.sessions.save(client_id, &session)?;
        tracing::debug!("client {client_id} submitted {count} answers");
        self.view_of(&session)
    }

    pub fn navigate(&self, client_id: &str, target: Navigation) -> Result<QuizView, QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        let (mut session, _) = self.require(client_id)?;
        let page = session.navigate(target)?;
        self.sessions.save(client_id, &session)?;
        tracing::debug!("client {client_id} moved to page {page}");
        self.view_of(&session)
    }

    /// Try to complete the quiz.
    ///
    /// A quiz the deadline check completed during this call counts as
    /// finished; one completed earlier is [`QuizError::NotInProgress`].
    pub fn finish(&self, client_id: &str) -> Result<FinishOutcome, QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        let (mut session, timed_out_now) = self.require(client_id)?;
        if timed_out_now {
            return Ok(FinishOutcome::Completed(self.grade(client_id, &mut session)?));
        }
        match session.finish(self.clock.now())? {
            FinishAttempt::Completed => {
                let report = self.grade(client_id, &mut session)?;
                Ok(FinishOutcome::Completed(report))
            }
            FinishAttempt::Incomplete { unanswered } => Ok(FinishOutcome::Incomplete {
                unanswered,
                page: page_view(&session, &self.bank, self.clock.now()),
            }),
        }
    }

    /// Report of a completed quiz. Statistics are never recorded twice.
    pub fn report(&self, client_id: &str) -> Result<QuizReport, QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        let (mut session, _) = self.require(client_id)?;
        if session.is_in_progress() {
            return Err(QuizError::NotCompleted);
        }
        self.grade(client_id, &mut session)
    }

    /// Drop the client's session; it is awaiting settings again.
    pub fn reset(&self, client_id: &str) -> Result<(), QuizError> {
        let lock = self.client_lock(client_id)?;
        let _guard = lock.lock().map_err(|_| StorageError::Poisoned("client"))?;

        self.sessions.remove(client_id)?;
        tracing::info!("client {client_id} reset their quiz");
        Ok(())
    }

    /// The mutex serializing requests for `client_id`.
    fn client_lock(&self, client_id: &str) -> Result<Arc<Mutex<()>>, QuizError> {
        let mut locks = self
            .client_locks
            .lock()
            .map_err(|_| StorageError::Poisoned("client locks"))?;
        Ok(locks.entry(client_id.to_string()).or_default().clone())
    }

    /// Load the session and apply the deadline check. The flag is set when
    /// this load is what timed the quiz out. Callers hold the client lock.
    fn load(&self, client_id: &str) -> Result<Option<(QuizSession, bool)>, QuizError> {
        let Some(mut session) = self.sessions.load(client_id)? else {
            return Ok(None);
        };
        let timed_out_now = session.check_deadline(self.clock.now());
        if timed_out_now {
            tracing::info!("client {client_id} quiz {} timed out", session.id);
            self.grade(client_id, &mut session)?;
        }
        Ok(Some((session, timed_out_now)))
    }

    fn require(&self, client_id: &str) -> Result<(QuizSession, bool), QuizError> {
        self.load(client_id)?.ok_or(QuizError::NoSession)
    }

    fn view_of(&self, session: &QuizSession) -> Result<QuizView, QuizError> {
        Ok(match session.status {
            SessionStatus::InProgress => {
                QuizView::InProgress(page_view(session, &self.bank, self.clock.now()))
            }
            SessionStatus::Completed => {
                QuizView::Completed(scorer::score(session, &self.bank).report)
            }
        })
    }

    /// Score a completed session, recording statistics on first grading.
    fn grade(
        &self,
        client_id: &str,
        session: &mut QuizSession,
    ) -> Result<QuizReport, QuizError> {
        let sheet = scorer::score(session, &self.bank);
        if !session.stats_recorded {
            // Another engine on the same stores may have graded it already.
            let stored = self.sessions.load(client_id)?;
            if stored.is_some_and(|s| s.id == session.id && s.stats_recorded) {
                session.stats_recorded = true;
                return Ok(sheet.report);
            }
            self.stats.record_all(&sheet.graded)?;
            session.stats_recorded = true;
            self.sessions.save(client_id, session)?;
            tracing::info!(
                "client {client_id} completed quiz {}: {}% ({} correct, {} incorrect)",
                session.id,
                sheet.report.score,
                sheet.report.correct_count,
                sheet.report.incorrect_count
            );
        }
        Ok(sheet.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Question;
    use crate::sessions::MemorySessionStore;
    use chrono::{Duration, TimeZone};

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn engine(count: usize) -> (QuizEngine, Arc<ManualClock>) {
        let bank = QuestionBank::new((1..=count).map(|i| Question {
            id: format!("q{i}"),
            prompt: format!("Prompt {i}"),
            choices: vec!["yes".into(), "no".into()],
            correct_choice: "yes".into(),
        }));
        let clock = Arc::new(ManualClock(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        )));
        let engine = QuizEngine::new(
            Arc::new(bank),
            Arc::new(StatisticsStore::in_memory()),
            Arc::new(MemorySessionStore::new()),
        )
        .with_rng(StdRng::seed_from_u64(11))
        .with_clock(clock.clone());
        (engine, clock)
    }

    fn request(total: u32, mode: &str, minutes: u32) -> SettingsRequest {
        SettingsRequest {
            duration_minutes: minutes,
            total_questions: total,
            mode: mode.into(),
            show_results: "end".into(),
            reveal_correct_answers: false,
        }
    }

    fn answer_all(engine: &QuizEngine, client: &str, total: usize, value: &str) {
        let answers: Vec<(usize, String)> = (1..=total).map(|p| (p, value.to_string())).collect();
        engine.submit(client, answers).unwrap();
    }

    #[test]
    fn awaiting_settings_without_session() {
        let (engine, _) = engine(3);
        assert_eq!(engine.view("c").unwrap(), QuizView::AwaitingSettings);
        assert!(matches!(engine.finish("c"), Err(QuizError::NoSession)));
        assert!(matches!(
            engine.navigate("c", Navigation::Next),
            Err(QuizError::NoSession)
        ));
    }

    #[test]
    fn invalid_settings_create_no_session() {
        let (engine, _) = engine(3);
        assert!(engine.start("c", &request(0, "practice", 0)).is_err());
        assert!(engine.start("c", &request(2, "speedrun", 0)).is_err());
        assert_eq!(engine.view("c").unwrap(), QuizView::AwaitingSettings);
    }

    #[test]
    fn finish_records_statistics_once() {
        let (engine, _) = engine(4);
        engine.start("c", &request(4, "practice", 0)).unwrap();
        answer_all(&engine, "c", 4, "yes");

        let FinishOutcome::Completed(report) = engine.finish("c").unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(report.score, 100);

        // Re-reading the report or finishing again must not double-count.
        assert_eq!(engine.report("c").unwrap(), report);
        assert!(matches!(
            engine.finish("c"),
            Err(QuizError::NotInProgress(SessionStatus::Completed))
        ));
        assert!(matches!(engine.view("c").unwrap(), QuizView::Completed(_)));

        let snapshot = engine.stats().snapshot().unwrap();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.values().all(|r| r.total_attempts == 1));
    }

    #[test]
    fn incomplete_finish_keeps_session_in_progress() {
        let (engine, _) = engine(3);
        engine.start("c", &request(3, "practice", 0)).unwrap();
        engine
            .submit("c", [(1, "yes".to_string()), (3, "no".to_string())])
            .unwrap();

        match engine.finish("c").unwrap() {
            FinishOutcome::Incomplete { unanswered, page } => {
                assert_eq!(unanswered, vec![2]);
                assert_eq!(page.answered_count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(engine.report("c"), Err(QuizError::NotCompleted)));
        assert!(engine.stats().snapshot().unwrap().is_empty());
    }

    #[test]
    fn exam_deadline_completes_on_next_read() {
        let (engine, clock) = engine(5);
        engine.start("c", &request(5, "exam", 10)).unwrap();
        clock.advance(Duration::minutes(11));

        let QuizView::Completed(report) = engine.view("c").unwrap() else {
            panic!("expected timeout completion");
        };
        assert!(report.timed_out);
        assert_eq!(report.score, 0);
        assert_eq!(report.elapsed_secs, Some(600));
        assert!(matches!(
            engine.submit("c", [(1, "yes".to_string())]),
            Err(QuizError::NotInProgress(SessionStatus::Completed))
        ));
    }

    #[test]
    fn timeout_records_only_answered_questions() {
        let (engine, clock) = engine(4);
        engine.start("c", &request(4, "exam", 5)).unwrap();
        engine
            .submit("c", [(1, "yes".to_string()), (2, "no".to_string())])
            .unwrap();
        clock.advance(Duration::minutes(5));

        let FinishOutcome::Completed(report) = engine.finish("c").unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(report.correct_count, 1);
        assert_eq!(report.incorrect_count, 1);
        assert_eq!(report.score, 50);
        assert_eq!(engine.stats().snapshot().unwrap().len(), 2);
    }

    #[test]
    fn start_grades_an_expired_exam_before_replacing_it() {
        let (engine, clock) = engine(6);
        engine.start("c", &request(5, "exam", 5)).unwrap();
        engine
            .submit("c", [(1, "yes".to_string()), (2, "no".to_string())])
            .unwrap();
        clock.advance(Duration::minutes(6));

        engine.start("c", &request(3, "practice", 0)).unwrap();

        let snapshot = engine.stats().snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.values().all(|r| r.total_attempts == 1));
        let QuizView::InProgress(page) = engine.view("c").unwrap() else {
            panic!("expected the new quiz");
        };
        assert_eq!(page.total_questions, 3);
    }

    #[test]
    fn start_rejects_a_running_quiz() {
        let (engine, _) = engine(4);
        engine.start("c", &request(4, "practice", 0)).unwrap();
        engine.submit("c", [(1, "yes".to_string())]).unwrap();

        assert!(matches!(
            engine.start("c", &request(2, "practice", 0)),
            Err(QuizError::AlreadyInProgress)
        ));
        let QuizView::InProgress(page) = engine.view("c").unwrap() else {
            panic!("expected the original quiz");
        };
        assert_eq!(page.total_questions, 4);
        assert_eq!(page.answered_count, 1);

        // Once completed, a new quiz may start.
        answer_all(&engine, "c", 4, "yes");
        engine.finish("c").unwrap();
        engine.start("c", &request(2, "practice", 0)).unwrap();
    }

    /// Session store that stalls every load, widening the window between
    /// reading a session and saving it back.
    struct SlowSessionStore(MemorySessionStore);

    impl SessionStore for SlowSessionStore {
        fn load(&self, client_id: &str) -> Result<Option<QuizSession>, StorageError> {
            let session = self.0.load(client_id);
            std::thread::sleep(std::time::Duration::from_millis(20));
            session
        }

        fn save(&self, client_id: &str, session: &QuizSession) -> Result<(), StorageError> {
            self.0.save(client_id, session)
        }

        fn remove(&self, client_id: &str) -> Result<(), StorageError> {
            self.0.remove(client_id)
        }
    }

    #[test]
    fn concurrent_finishes_record_once() {
        let bank = QuestionBank::new((1..=4).map(|i| Question {
            id: format!("q{i}"),
            prompt: format!("Prompt {i}"),
            choices: vec!["yes".into(), "no".into()],
            correct_choice: "yes".into(),
        }));
        let engine = QuizEngine::new(
            Arc::new(bank),
            Arc::new(StatisticsStore::in_memory()),
            Arc::new(SlowSessionStore(MemorySessionStore::new())),
        )
        .with_rng(StdRng::seed_from_u64(5));
        engine.start("c", &request(4, "practice", 0)).unwrap();
        answer_all(&engine, "c", 4, "yes");

        let barrier = std::sync::Barrier::new(2);
        let outcomes: Vec<Result<FinishOutcome, QuizError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        engine.finish("c")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // One call completes the quiz; the other finds it already completed.
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Ok(FinishOutcome::Completed(_))))
                .count(),
            1
        );
        let snapshot = engine.stats().snapshot().unwrap();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.values().all(|r| r.total_attempts == 1));
    }

    #[test]
    fn navigation_is_persisted() {
        let (engine, _) = engine(25);
        engine.start("c", &request(25, "practice", 0)).unwrap();
        engine.navigate("c", Navigation::Question(15)).unwrap();
        let QuizView::InProgress(page) = engine.view("c").unwrap() else {
            panic!("expected in progress");
        };
        assert_eq!(page.page, 2);
        assert_eq!(page.questions[0].position, 11);
        assert!(matches!(
            engine.navigate("c", Navigation::Page(9)),
            Err(QuizError::PageOutOfRange { .. })
        ));
    }

    #[test]
    fn reset_and_restart() {
        let (engine, _) = engine(3);
        engine.start("c", &request(3, "practice", 0)).unwrap();
        engine.reset("c").unwrap();
        assert_eq!(engine.view("c").unwrap(), QuizView::AwaitingSettings);

        engine.start("c", &request(2, "practice", 0)).unwrap();
        let QuizView::InProgress(page) = engine.view("c").unwrap() else {
            panic!("expected in progress");
        };
        assert_eq!(page.total_questions, 2);
    }

    #[test]
    fn clients_are_isolated() {
        let (engine, _) = engine(3);
        engine.start("a", &request(3, "practice", 0)).unwrap();
        assert_eq!(engine.view("b").unwrap(), QuizView::AwaitingSettings);
    }
}
