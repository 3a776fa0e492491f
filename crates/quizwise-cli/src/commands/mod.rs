pub mod init;
pub mod quiz;
pub mod stats;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use quizwise_core::config::{load_config_from, QuizwiseConfig};
use quizwise_core::sessions::FileSessionStore;
use quizwise_core::statistics::StatisticsStore;
use quizwise_core::QuizEngine;

/// Load the config and wire an engine over its bank, stats file and
/// session directory.
pub(crate) fn open_engine(config_path: Option<&Path>) -> Result<(QuizwiseConfig, QuizEngine)> {
    let config = load_config_from(config_path)?;
    let bank = quizwise_core::bank::load_bank(&config.question_bank).with_context(|| {
        format!(
            "cannot open question bank {} (run `quizwise init` to create one)",
            config.question_bank.display()
        )
    })?;
    tracing::debug!(
        "using bank {} ({} questions), stats {}",
        config.question_bank.display(),
        bank.len(),
        config.stats_path.display()
    );
    let engine = QuizEngine::new(
        Arc::new(bank),
        Arc::new(StatisticsStore::open_json(&config.stats_path)),
        Arc::new(FileSessionStore::new(&config.sessions_dir)),
    );
    Ok((config, engine))
}
