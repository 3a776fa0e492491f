//! Error types for quiz operations and durable storage.
//!
//! Missing questions are deliberately absent from this taxonomy: an id that
//! disappeared from the bank is skipped, never reported. Likewise an attempt
//! to finish with unanswered questions is an outcome, not an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionStatus;

/// Errors surfaced by quiz operations.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The settings payload was rejected before any session was created.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// There are no questions to draw from.
    #[error("question bank is empty")]
    EmptyBank,

    /// The client has no quiz (awaiting settings).
    #[error("no quiz has been started")]
    NoSession,

    /// The operation needs an in-progress quiz.
    #[error("quiz is not in progress (status: {0})")]
    NotInProgress(SessionStatus),

    /// A new quiz was requested while one is still running.
    #[error("a quiz is already in progress; finish or reset it first")]
    AlreadyInProgress,

    /// The operation needs a completed quiz.
    #[error("quiz has not been completed yet")]
    NotCompleted,

    #[error("page {page} is out of range (1..={total_pages})")]
    PageOutOfRange { page: usize, total_pages: usize },

    #[error("question {position} is out of range (1..={total})")]
    PositionOutOfRange { position: usize, total: usize },

    /// Reading or writing durable state failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of the durable statistics and session backings.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A thread panicked while holding a store lock.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl QuizError {
    /// Returns `true` if the caller sent something it should not have
    /// (bad settings, wrong state, out-of-range target) as opposed to a
    /// storage failure on our side.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, QuizError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = QuizError::PageOutOfRange {
            page: 4,
            total_pages: 3,
        };
        assert_eq!(err.to_string(), "page 4 is out of range (1..=3)");

        let err = QuizError::NotInProgress(SessionStatus::Completed);
        assert_eq!(err.to_string(), "quiz is not in progress (status: completed)");
    }

    #[test]
    fn storage_errors_are_not_caller_errors() {
        let err: QuizError = StorageError::Poisoned("statistics").into();
        assert!(!err.is_caller_error());
        assert!(QuizError::NoSession.is_caller_error());
        assert!(QuizError::AlreadyInProgress.is_caller_error());
    }
}
