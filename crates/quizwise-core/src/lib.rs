//! quizwise-core: adaptive question selection, quiz sessions, and scoring.
//!
//! This crate holds everything with real logic in quizwise: the question
//! bank, per-question statistics, the tiered adaptive selector, the quiz
//! session state machine, and the scorer. Front ends drive it through
//! [`engine::QuizEngine`] and render the projections in [`view`].

pub mod bank;
pub mod config;
pub mod engine;
pub mod error;
pub mod scorer;
pub mod selector;
pub mod session;
pub mod sessions;
pub mod statistics;
pub mod view;

pub use engine::{Clock, FinishOutcome, QuizEngine, QuizView, SystemClock};
pub use error::{QuizError, StorageError};
